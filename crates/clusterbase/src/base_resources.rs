//! Base resource template

use crate::manager::Manager;
use crate::resources;
use clusterbase_cloud::{
    ClusterDocument, Deployment, Feature, OutboundType, ResourceGraph, ResourceReference, Result,
    Template, Visibility,
};

pub const STORAGE_SERVICE_ENDPOINT: &str = "Microsoft.Storage";

/// Name of the base resource deployment in the cluster resource group
pub const BASE_DEPLOYMENT_NAME: &str = "storage";

/// Fresh name for a managed outbound public IP
pub fn managed_outbound_ip_name() -> String {
    format!("{}-outbound-pip-v4", uuid::Uuid::new_v4())
}

impl Manager {
    /// Assemble the base resource template.
    ///
    /// Generated outbound IP names are stored on the cluster before the
    /// load balancer that references them is added.
    pub async fn build_base_resources(&mut self) -> Result<Template> {
        let storage_subnets = self
            .subnets_with_service_endpoint(STORAGE_SERVICE_ENDPOINT)
            .await?;

        let cluster = self.cluster();
        let properties = &cluster.properties;
        let infra_id = properties.infra_id.clone();
        let region = cluster.region();
        let master_subnet_id = properties.master_profile.subnet_id.clone();
        let cluster_account = format!("cluster{}", properties.storage_suffix);
        let registry_account = properties.image_registry_storage_account_name.clone();
        let sp_object_id = properties.service_principal_profile.sp_object_id.clone();
        let api_server_public = properties.api_server_profile.visibility == Visibility::Public;
        let ingress_public = properties
            .ingress_profiles
            .first()
            .is_some_and(|p| p.visibility == Visibility::Public);
        let outbound_via_lb =
            properties.network_profile.outbound_type == OutboundType::Loadbalancer;
        let gateway_enabled = properties.feature_profile.gateway_enabled;

        let mut graph = ResourceGraph::new();
        for resource in [
            resources::storage_account(&cluster_account, &region, &storage_subnets, true),
            resources::storage_account_blob_container(&cluster_account, "ignition"),
            resources::storage_account_blob_container(&cluster_account, "aro"),
            resources::storage_account(&registry_account, &region, &storage_subnets, true),
            resources::storage_account_blob_container(&registry_account, "image-registry"),
            resources::cluster_nsg(&infra_id, &region, api_server_public),
            resources::cluster_service_principal_rbac(&sp_object_id),
            resources::private_link_service(
                &infra_id,
                &region,
                &master_subnet_id,
                self.env().rp_subscription_id(),
            ),
            resources::internal_load_balancer(&infra_id, &region, &master_subnet_id),
        ] {
            graph.add(resource)?;
        }

        if outbound_via_lb {
            self.add_public_load_balancer(&mut graph).await?;

            if ingress_public {
                graph.add(resources::public_ip_address(
                    &region,
                    &resources::default_public_ip_name(&infra_id),
                ))?;
            }
        }

        if gateway_enabled {
            graph.add(resources::private_endpoint(
                &infra_id,
                &region,
                &master_subnet_id,
                self.env().gateway_private_link_service_id(),
            ))?;
        }

        if !self.env().feature_is_set(Feature::DisableDenyAssignments) {
            graph.add(resources::deny_assignment(&sp_object_id))?;
        }

        tracing::debug!(resources = graph.len(), "Built base resource graph");
        graph.into_template()
    }

    async fn add_public_load_balancer(&mut self, graph: &mut ResourceGraph) -> Result<()> {
        let properties = &self.cluster().properties;
        let infra_id = properties.infra_id.clone();
        let region = self.cluster().region();
        let resource_group_id = properties.cluster_profile.resource_group_id.clone();
        let api_server_public = properties.api_server_profile.visibility == Visibility::Public;
        let managed_count = properties
            .network_profile
            .load_balancer_profile
            .as_ref()
            .and_then(|p| p.managed_outbound_ips)
            .map(|m| m.count as usize);

        let mut outbound_ips: Vec<String> = Vec::new();

        if api_server_public {
            let name = resources::api_public_ip_name(&infra_id);
            graph.add(resources::public_ip_address(&region, &name))?;
            if managed_count.is_some() {
                outbound_ips.push(name);
            }
        }

        if let Some(count) = managed_count {
            while outbound_ips.len() < count {
                let name = managed_outbound_ip_name();
                graph.add(resources::public_ip_address(&region, &name))?;
                outbound_ips.push(name);
            }
        }

        let references: Vec<ResourceReference> = outbound_ips
            .iter()
            .map(|name| ResourceReference {
                id: resources::public_ip_id(&resource_group_id, name),
            })
            .collect();
        self.patch_effective_outbound_ips(references).await?;

        graph.add(resources::public_load_balancer(
            &infra_id,
            &region,
            api_server_public,
            &outbound_ips,
        ))
    }

    async fn patch_effective_outbound_ips(&mut self, ips: Vec<ResourceReference>) -> Result<()> {
        tracing::info!(count = ips.len(), "Recording effective outbound IPs");
        self.patch(&|doc: &mut ClusterDocument| {
            let network = &mut doc.cluster.properties.network_profile;
            if network.load_balancer_profile.is_none() && ips.is_empty() {
                return Ok(());
            }
            network
                .load_balancer_profile
                .get_or_insert_with(Default::default)
                .effective_outbound_ips = ips.clone();
            Ok(())
        })
        .await
    }

    /// Build and deploy the base resources, blocking until the deployment
    /// is terminal
    pub async fn deploy_base_resource_template(&mut self) -> Result<()> {
        let template = self.build_base_resources().await?;
        let resource_group = self.cluster().resource_group_name().to_string();

        tracing::info!(
            resource_group = %resource_group,
            deployment = BASE_DEPLOYMENT_NAME,
            resources = template.resources.len(),
            "Deploying base resources"
        );

        self.clients()
            .deployments
            .create_or_update_and_wait(
                &resource_group,
                BASE_DEPLOYMENT_NAME,
                &Deployment::incremental(template, None),
            )
            .await?;
        Ok(())
    }
}
