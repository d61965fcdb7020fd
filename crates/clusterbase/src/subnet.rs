//! Subnet service-endpoint discovery

use crate::manager::Manager;
use clusterbase_cloud::Result;
use std::collections::BTreeMap;

/// Endpoint location matching every region
const ANY_LOCATION: &str = "*";

impl Manager {
    /// Cluster subnets with `service` enabled for the cluster's region.
    ///
    /// Subnets are deduplicated case-insensitively across the master and
    /// worker pools; pools without a subnet are skipped. Any lookup failure
    /// is returned as-is.
    pub async fn subnets_with_service_endpoint(&self, service: &str) -> Result<Vec<String>> {
        let properties = &self.cluster().properties;

        let mut unique: BTreeMap<String, &str> = BTreeMap::new();
        let worker_subnets = properties
            .enriched_worker_profiles()
            .iter()
            .map(|p| p.subnet_id.as_str());
        let master_subnet = properties.master_profile.subnet_id.as_str();
        for subnet_id in std::iter::once(master_subnet).chain(worker_subnets) {
            if subnet_id.is_empty() {
                continue;
            }
            unique.entry(subnet_id.to_lowercase()).or_insert(subnet_id);
        }

        let region = &self.cluster().location;
        let mut matching = Vec::new();

        for subnet_id in unique.into_values() {
            let subnet = self.clients().subnets.get(subnet_id).await?;

            let enabled = subnet.properties.service_endpoints.iter().any(|endpoint| {
                endpoint
                    .service
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(service))
                    && endpoint
                        .locations
                        .iter()
                        .any(|l| l == ANY_LOCATION || l.eq_ignore_ascii_case(region))
            });

            if enabled {
                tracing::debug!(subnet_id, service, "Subnet has service endpoint");
                matching.push(subnet_id.to_string());
            }
        }

        Ok(matching)
    }
}
