//! Fixtures shared by the unit tests

use crate::manager::{Clients, Manager};
use clusterbase_cloud::fake::{FakeDeployments, FakeEnvironment, FakeResourceGroups, FakeSubnets};
use clusterbase_cloud::{
    ApiServerProfile, Cluster, ClusterDocument, ClusterProfile, ClusterProperties, ClusterStore,
    IngressProfile, LoadBalancerProfile, ManagedOutboundIps, MasterProfile, MemoryClusterStore,
    NetworkProfile, ServicePrincipalProfile, Subnet, WorkerProfile,
};
use std::sync::Arc;

pub(crate) const CLUSTER_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/customer-rg/providers/Microsoft.RedHatOpenShift/openShiftClusters/my-cluster";
pub(crate) const RESOURCE_GROUP: &str = "cluster-infra";
pub(crate) const RESOURCE_GROUP_ID: &str =
    "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/cluster-infra";
pub(crate) const MASTER_SUBNET_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/vnet-rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/master";
pub(crate) const WORKER_SUBNET_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/vnet-rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/worker";
pub(crate) const INFRA_ID: &str = "my-cluster-x7k2p";
pub(crate) const SP_OBJECT_ID: &str = "11111111-2222-3333-4444-555555555555";

pub(crate) fn cluster() -> Cluster {
    Cluster {
        id: CLUSTER_ID.to_string(),
        name: "my-cluster".to_string(),
        location: "eastus".to_string(),
        properties: ClusterProperties {
            cluster_profile: ClusterProfile {
                resource_group_id: RESOURCE_GROUP_ID.to_string(),
            },
            infra_id: INFRA_ID.to_string(),
            storage_suffix: "x7k2p".to_string(),
            image_registry_storage_account_name: "imageregistryx7k2p".to_string(),
            network_profile: NetworkProfile {
                load_balancer_profile: Some(LoadBalancerProfile {
                    managed_outbound_ips: Some(ManagedOutboundIps { count: 1 }),
                    effective_outbound_ips: Vec::new(),
                }),
                ..Default::default()
            },
            master_profile: MasterProfile {
                subnet_id: MASTER_SUBNET_ID.to_string(),
            },
            api_server_profile: ApiServerProfile::default(),
            ingress_profiles: vec![IngressProfile {
                name: "default".to_string(),
                ..Default::default()
            }],
            worker_profiles: vec![WorkerProfile {
                name: "worker".to_string(),
                vm_size: "Standard_D4s_v3".to_string(),
                count: 3,
                subnet_id: WORKER_SUBNET_ID.to_string(),
            }],
            service_principal_profile: ServicePrincipalProfile {
                client_id: "sp-client".to_string(),
                sp_object_id: SP_OBJECT_ID.to_string(),
            },
            ..Default::default()
        },
    }
}

pub(crate) fn subnet(id: &str) -> Subnet {
    Subnet {
        id: Some(id.to_string()),
        name: id.rsplit('/').next().map(str::to_string),
        ..Default::default()
    }
}

pub(crate) struct TestHarness {
    pub store: Arc<MemoryClusterStore>,
    pub resource_groups: Arc<FakeResourceGroups>,
    pub subnets: Arc<FakeSubnets>,
    pub deployments: Arc<FakeDeployments>,
    pub env: Arc<FakeEnvironment>,
    doc: ClusterDocument,
}

pub(crate) struct HarnessBuilder {
    cluster: Cluster,
    resource_groups: FakeResourceGroups,
    subnets: Option<FakeSubnets>,
    env: FakeEnvironment,
}

impl HarnessBuilder {
    pub fn resource_groups(mut self, groups: FakeResourceGroups) -> Self {
        self.resource_groups = groups;
        self
    }

    pub fn subnets(mut self, subnets: FakeSubnets) -> Self {
        self.subnets = Some(subnets);
        self
    }

    pub fn env(mut self, env: FakeEnvironment) -> Self {
        self.env = env;
        self
    }

    pub async fn build(self) -> TestHarness {
        let store = Arc::new(MemoryClusterStore::new("test-holder"));
        let doc = ClusterDocument::new(self.cluster);
        store.insert(doc.clone()).await;
        let doc = store.acquire_lease(&doc.key).await.unwrap();

        let subnets = self.subnets.unwrap_or_else(|| {
            FakeSubnets::new()
                .with_subnet(MASTER_SUBNET_ID, subnet(MASTER_SUBNET_ID))
                .with_subnet(WORKER_SUBNET_ID, subnet(WORKER_SUBNET_ID))
        });

        TestHarness {
            store,
            resource_groups: Arc::new(self.resource_groups),
            subnets: Arc::new(subnets),
            deployments: Arc::new(FakeDeployments::new()),
            env: Arc::new(self.env),
            doc,
        }
    }
}

impl TestHarness {
    pub async fn new(cluster: Cluster) -> Self {
        Self::builder(cluster).build().await
    }

    pub fn builder(cluster: Cluster) -> HarnessBuilder {
        HarnessBuilder {
            cluster,
            resource_groups: FakeResourceGroups::new(),
            subnets: None,
            env: FakeEnvironment::new(),
        }
    }

    pub fn manager(&self) -> Manager {
        Manager::new(
            self.doc.clone(),
            self.store.clone(),
            self.env.clone(),
            Clients {
                resource_groups: self.resource_groups.clone(),
                subnets: self.subnets.clone(),
                deployments: self.deployments.clone(),
            },
        )
    }

    pub async fn stored(&self) -> ClusterDocument {
        self.store.get(&self.doc.key).await.unwrap()
    }
}
