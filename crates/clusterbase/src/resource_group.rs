//! Cluster resource group adoption

use crate::manager::Manager;
use clusterbase_cloud::{
    ApiError, ErrorCode, ErrorDetail, ProviderFault, ResourceGroup, Result,
};

/// Tag marking development groups for the cleanup job
const PURGE_TAG: &str = "purge";

impl Manager {
    /// Create the cluster resource group, or adopt it when it already
    /// belongs to this cluster.
    ///
    /// An existing group in another location or managed by anything else
    /// is rejected, never modified.
    pub async fn ensure_resource_group(&self) -> Result<()> {
        let cluster = self.cluster();
        let resource_group_id = &cluster.properties.cluster_profile.resource_group_id;
        let name = cluster.resource_group_name();

        let mut group = match self.clients().resource_groups.get(name).await {
            // existing configuration such as tags is retained
            Ok(group) => group,
            Err(err) if err.fault() == ProviderFault::NotFound => {
                tracing::info!(resource_group = name, "Resource group not found, creating");
                ResourceGroup {
                    location: Some(cluster.location.clone()),
                    managed_by: Some(cluster.id.clone()),
                    ..Default::default()
                }
            }
            Err(err) => return Err(err.into()),
        };

        let location_matches = group
            .location
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case(&cluster.location));
        let owner_matches = group
            .managed_by
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(&cluster.id));

        if !location_matches || !owner_matches {
            tracing::warn!(
                resource_group = name,
                location = ?group.location,
                managed_by = ?group.managed_by,
                "Resource group exists with a different identity"
            );
            return Err(ApiError::bad_request(
                ErrorCode::ClusterResourceGroupAlreadyExists,
                format!("Resource group {} must not already exist.", resource_group_id),
            )
            .into());
        }

        if self.env().is_local_development_mode() {
            group.tags.insert(PURGE_TAG.to_string(), "true".to_string());
        }

        // re-putting the group also restores provider access after the
        // subscription moves between tenants
        if let Err(err) = self
            .clients()
            .resource_groups
            .create_or_update(name, &group)
            .await
        {
            return Err(match err.fault() {
                ProviderFault::PolicyDenied { raw, .. } => {
                    tracing::warn!(resource_group = name, "Resource group disallowed by policy");
                    ApiError::bad_request(ErrorCode::DeploymentFailed, "Deployment failed.")
                        .with_detail(ErrorDetail::new(None, raw))
                        .into()
                }
                _ => err.into(),
            });
        }

        self.env()
            .ensure_resource_group_role_assignment(resource_group_id)
            .await
    }
}
