//! Master subnet network policies

use crate::manager::Manager;
use clusterbase_cloud::{ApiError, ErrorCode, ErrorDetail, ProviderFault, Result};

const POLICY_DISABLED: &str = "Disabled";

impl Manager {
    /// Disable the network policies that would block the private link
    /// service (and, with the gateway, the private endpoint) on the master
    /// subnet
    pub async fn set_master_subnet_policies(&self) -> Result<()> {
        let properties = &self.cluster().properties;
        let subnet_id = properties.master_profile.subnet_id.as_str();

        let mut subnet = self.clients().subnets.get(subnet_id).await?;

        if properties.feature_profile.gateway_enabled {
            subnet.properties.private_endpoint_network_policies = Some(POLICY_DISABLED.to_string());
        }
        subnet.properties.private_link_service_network_policies = Some(POLICY_DISABLED.to_string());

        let Err(err) = self
            .clients()
            .subnets
            .create_or_update(subnet_id, &subnet)
            .await
        else {
            tracing::info!(subnet_id, "Updated master subnet policies");
            return Ok(());
        };

        let ProviderFault::PolicyDenied { raw, violation } = err.fault() else {
            return Err(err.into());
        };

        let resource = subnet_id.rsplit('/').next().unwrap_or(subnet_id);
        tracing::warn!(subnet_id, "Master subnet update disallowed by policy");

        let detail = match violation {
            Some(violation) => violation.to_string(),
            None => raw,
        };
        Err(ApiError::bad_request(
            ErrorCode::RequestDisallowedByPolicy,
            format!("Resource {} was disallowed by policy.", resource),
        )
        .with_detail(ErrorDetail::new(Some(ErrorCode::RequestDisallowedByPolicy), detail))
        .into())
    }
}
