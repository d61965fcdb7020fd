//! Network security group attachment

use crate::manager::Manager;
use crate::resources;
use clusterbase_cloud::{
    ApiError, Cluster, ErrorCode, PreconfiguredNsg, ProviderFault, Result, SubResource,
};

/// Resource id of the cluster NSG declared by the base template
pub fn network_security_group_id(cluster: &Cluster) -> String {
    format!(
        "{}/providers/Microsoft.Network/networkSecurityGroups/{}",
        cluster.properties.cluster_profile.resource_group_id,
        resources::nsg_name(&cluster.properties.infra_id)
    )
}

impl Manager {
    /// Attach the cluster NSG to the master and first worker subnets.
    ///
    /// Returns `Ok(false)` while the freshly deployed NSG is not yet visible
    /// to the network API, `Ok(true)` once both subnets carry it.
    pub async fn attach_nsgs(&self) -> Result<bool> {
        let properties = &self.cluster().properties;

        if properties.network_profile.preconfigured_nsg == PreconfiguredNsg::Enabled {
            tracing::debug!("Preconfigured NSG in use, skipping attachment");
            return Ok(true);
        }

        let workers = properties.enriched_worker_profiles();
        let Some(worker) = workers.first() else {
            return Err(ApiError::bad_request(
                ErrorCode::InvalidParameter,
                "The cluster has no worker profiles.",
            )
            .into());
        };

        let nsg_id = network_security_group_id(self.cluster());

        for subnet_id in [properties.master_profile.subnet_id.as_str(), worker.subnet_id.as_str()] {
            let mut subnet = self.clients().subnets.get(subnet_id).await?;

            if let Some(attached) = &subnet.properties.network_security_group {
                if attached.id.eq_ignore_ascii_case(&nsg_id) {
                    continue;
                }
                tracing::warn!(subnet_id, nsg = %attached.id, "Subnet already has a foreign NSG");
                return Err(ApiError::new(
                    clusterbase_cloud::STATUS_BAD_REQUEST,
                    ErrorCode::InvalidLinkedVNet,
                    Some(subnet_id.to_string()),
                    format!(
                        "The provided subnet '{}' is invalid: must not have a network security group attached.",
                        subnet_id
                    ),
                )
                .into());
            }

            subnet.properties.network_security_group = Some(SubResource::new(&nsg_id));

            if let Err(err) = self
                .clients()
                .subnets
                .create_or_update(subnet_id, &subnet)
                .await
            {
                if err.fault() == ProviderFault::Transient {
                    tracing::info!(subnet_id, "NSG not yet visible to the network API");
                    return Ok(false);
                }
                return Err(err.into());
            }

            tracing::info!(subnet_id, nsg = %nsg_id, "Attached NSG");
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        INFRA_ID, MASTER_SUBNET_ID, RESOURCE_GROUP_ID, TestHarness, WORKER_SUBNET_ID, cluster,
        subnet,
    };
    use clusterbase_cloud::fake::FakeSubnets;
    use clusterbase_cloud::{CloudError, ProviderError};

    fn expected_nsg_id() -> String {
        format!(
            "{}/providers/Microsoft.Network/networkSecurityGroups/{}-nsg",
            RESOURCE_GROUP_ID, INFRA_ID
        )
    }

    fn not_ready() -> ProviderError {
        ProviderError::detailed(
            400,
            "PUT",
            MASTER_SUBNET_ID,
            ProviderError::request(
                "InvalidResourceReference",
                format!(
                    "Resource {} referenced by resource {} was not found.",
                    expected_nsg_id(),
                    MASTER_SUBNET_ID
                ),
            ),
        )
    }

    #[test]
    fn test_network_security_group_id() {
        assert_eq!(network_security_group_id(&cluster()), expected_nsg_id());
    }

    #[tokio::test]
    async fn test_attaches_to_master_and_first_worker() {
        let harness = TestHarness::new(cluster()).await;

        assert!(harness.manager().attach_nsgs().await.unwrap());

        let puts = harness.subnets.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].0, MASTER_SUBNET_ID);
        assert_eq!(puts[1].0, WORKER_SUBNET_ID);
        for (id, _) in &puts {
            let stored = harness.subnets.subnet(id).unwrap();
            assert_eq!(
                stored.properties.network_security_group.unwrap().id,
                expected_nsg_id()
            );
        }
    }

    #[tokio::test]
    async fn test_already_attached_is_left_alone() {
        let mut master = subnet(MASTER_SUBNET_ID);
        master.properties.network_security_group =
            Some(SubResource::new(expected_nsg_id().to_uppercase()));
        let harness = TestHarness::builder(cluster())
            .subnets(
                FakeSubnets::new()
                    .with_subnet(MASTER_SUBNET_ID, master)
                    .with_subnet(WORKER_SUBNET_ID, subnet(WORKER_SUBNET_ID)),
            )
            .build()
            .await;

        assert!(harness.manager().attach_nsgs().await.unwrap());
        let puts = harness.subnets.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, WORKER_SUBNET_ID);
    }

    #[tokio::test]
    async fn test_foreign_nsg_is_rejected() {
        let mut worker = subnet(WORKER_SUBNET_ID);
        worker.properties.network_security_group = Some(SubResource::new(
            "/subscriptions/x/resourceGroups/y/providers/Microsoft.Network/networkSecurityGroups/other",
        ));
        let harness = TestHarness::builder(cluster())
            .subnets(
                FakeSubnets::new()
                    .with_subnet(MASTER_SUBNET_ID, subnet(MASTER_SUBNET_ID))
                    .with_subnet(WORKER_SUBNET_ID, worker),
            )
            .build()
            .await;

        let err = harness.manager().attach_nsgs().await.unwrap_err();

        let api = err.api_error().unwrap();
        assert_eq!(api.status_code, 400);
        assert_eq!(api.code, ErrorCode::InvalidLinkedVNet);
        assert_eq!(api.target.as_deref(), Some(WORKER_SUBNET_ID));
        assert_eq!(
            api.message,
            format!(
                "The provided subnet '{}' is invalid: must not have a network security group attached.",
                WORKER_SUBNET_ID
            )
        );
        // master was attached before the worker was inspected
        assert_eq!(harness.subnets.puts().len(), 1);
    }

    #[tokio::test]
    async fn test_nsg_not_yet_visible_is_not_ready() {
        let harness = TestHarness::new(cluster()).await;
        harness.subnets.fail_next_put(not_ready());

        assert!(!harness.manager().attach_nsgs().await.unwrap());
        assert_eq!(harness.subnets.puts().len(), 1);

        // next poll succeeds
        assert!(harness.manager().attach_nsgs().await.unwrap());
    }

    #[tokio::test]
    async fn test_other_put_errors_are_returned() {
        let harness = TestHarness::new(cluster()).await;
        harness
            .subnets
            .fail_next_put(ProviderError::request("InUseSubnetCannotBeUpdated", "busy"));

        let err = harness.manager().attach_nsgs().await.unwrap_err();
        assert!(matches!(err, CloudError::Provider(ProviderError::Request(_))));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_returned() {
        let harness = TestHarness::new(cluster()).await;
        harness.subnets.fail_get(
            MASTER_SUBNET_ID,
            ProviderError::Transport("connection reset".to_string()),
        );

        let err = harness.manager().attach_nsgs().await.unwrap_err();
        assert!(matches!(err, CloudError::Provider(ProviderError::Transport(_))));
    }

    #[tokio::test]
    async fn test_preconfigured_nsg_is_ready_without_calls() {
        let mut c = cluster();
        c.properties.network_profile.preconfigured_nsg = PreconfiguredNsg::Enabled;
        let harness = TestHarness::new(c).await;

        assert!(harness.manager().attach_nsgs().await.unwrap());
        assert!(harness.subnets.gets().is_empty());
        assert!(harness.subnets.puts().is_empty());
    }

    #[tokio::test]
    async fn test_no_worker_profiles_is_invalid() {
        let mut c = cluster();
        c.properties.worker_profiles.clear();
        let harness = TestHarness::new(c).await;

        let err = harness.manager().attach_nsgs().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParameter));
    }
}
