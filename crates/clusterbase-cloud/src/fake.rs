//! In-memory fakes of the client traits, for tests

use crate::error::Result;
use crate::fault::ProviderError;
use crate::provider::{
    Deployment, DeploymentsClient, Environment, Feature, ProviderResult, ResourceGroup,
    ResourceGroupsClient, RoleAssignment, RoleAssignmentsClient, Subnet, SubnetsClient,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

fn not_found(url: &str) -> ProviderError {
    ProviderError::detailed(
        404,
        "GET",
        url,
        ProviderError::request("NotFound", format!("{} was not found", url)),
    )
}

/// Resource groups keyed by name
#[derive(Default)]
pub struct FakeResourceGroups {
    groups: Mutex<HashMap<String, ResourceGroup>>,
    put_errors: Mutex<VecDeque<ProviderError>>,
    puts: Mutex<Vec<(String, ResourceGroup)>>,
}

impl FakeResourceGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, name: &str, group: ResourceGroup) -> Self {
        self.groups.lock().unwrap().insert(name.to_string(), group);
        self
    }

    /// Queue an error for the next create_or_update
    pub fn fail_next_put(&self, err: ProviderError) {
        self.put_errors.lock().unwrap().push_back(err);
    }

    pub fn puts(&self) -> Vec<(String, ResourceGroup)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceGroupsClient for FakeResourceGroups {
    async fn get(&self, name: &str) -> ProviderResult<ResourceGroup> {
        self.groups
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    async fn create_or_update(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> ProviderResult<ResourceGroup> {
        self.puts
            .lock()
            .unwrap()
            .push((name.to_string(), group.clone()));
        if let Some(err) = self.put_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.groups
            .lock()
            .unwrap()
            .insert(name.to_string(), group.clone());
        Ok(group.clone())
    }
}

/// Subnets keyed by lower-cased ID
#[derive(Default)]
pub struct FakeSubnets {
    subnets: Mutex<HashMap<String, Subnet>>,
    get_errors: Mutex<HashMap<String, ProviderError>>,
    put_errors: Mutex<VecDeque<ProviderError>>,
    gets: Mutex<Vec<String>>,
    puts: Mutex<Vec<(String, Subnet)>>,
}

impl FakeSubnets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subnet(self, id: &str, subnet: Subnet) -> Self {
        self.subnets.lock().unwrap().insert(id.to_lowercase(), subnet);
        self
    }

    pub fn fail_get(&self, id: &str, err: ProviderError) {
        self.get_errors
            .lock()
            .unwrap()
            .insert(id.to_lowercase(), err);
    }

    pub fn fail_next_put(&self, err: ProviderError) {
        self.put_errors.lock().unwrap().push_back(err);
    }

    pub fn subnet(&self, id: &str) -> Option<Subnet> {
        self.subnets.lock().unwrap().get(&id.to_lowercase()).cloned()
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<(String, Subnet)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubnetsClient for FakeSubnets {
    async fn get(&self, subnet_id: &str) -> ProviderResult<Subnet> {
        self.gets.lock().unwrap().push(subnet_id.to_string());
        let key = subnet_id.to_lowercase();
        if let Some(err) = self.get_errors.lock().unwrap().get(&key) {
            return Err(err.clone());
        }
        self.subnets
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(subnet_id))
    }

    async fn create_or_update(&self, subnet_id: &str, subnet: &Subnet) -> ProviderResult<()> {
        self.puts
            .lock()
            .unwrap()
            .push((subnet_id.to_string(), subnet.clone()));
        if let Some(err) = self.put_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.subnets
            .lock()
            .unwrap()
            .insert(subnet_id.to_lowercase(), subnet.clone());
        Ok(())
    }
}

/// Records submitted deployments
#[derive(Default)]
pub struct FakeDeployments {
    submitted: Mutex<Vec<(String, String, Deployment)>>,
    errors: Mutex<VecDeque<ProviderError>>,
}

impl FakeDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, err: ProviderError) {
        self.errors.lock().unwrap().push_back(err);
    }

    /// (resource group, deployment name, deployment) in submission order
    pub fn submitted(&self) -> Vec<(String, String, Deployment)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentsClient for FakeDeployments {
    async fn create_or_update_and_wait(
        &self,
        resource_group: &str,
        name: &str,
        deployment: &Deployment,
    ) -> ProviderResult<()> {
        self.submitted.lock().unwrap().push((
            resource_group.to_string(),
            name.to_string(),
            deployment.clone(),
        ));
        match self.errors.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get(&self, resource_group: &str, name: &str) -> ProviderResult<Deployment> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(rg, n, _)| rg == resource_group && n == name)
            .map(|(_, _, d)| d.clone())
            .ok_or_else(|| not_found(name))
    }
}

/// Records role assignments
#[derive(Default)]
pub struct FakeRoleAssignments {
    created: Mutex<Vec<(String, String, RoleAssignment)>>,
    errors: Mutex<VecDeque<ProviderError>>,
}

impl FakeRoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, err: ProviderError) {
        self.errors.lock().unwrap().push_back(err);
    }

    pub fn created(&self) -> Vec<(String, String, RoleAssignment)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleAssignmentsClient for FakeRoleAssignments {
    async fn create(
        &self,
        scope: &str,
        name: &str,
        assignment: &RoleAssignment,
    ) -> ProviderResult<RoleAssignment> {
        if let Some(err) = self.errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.created.lock().unwrap().push((
            scope.to_string(),
            name.to_string(),
            assignment.clone(),
        ));
        Ok(assignment.clone())
    }
}

/// Environment with fixed flags; records role-assignment checks
pub struct FakeEnvironment {
    local_development: bool,
    features: HashSet<Feature>,
    rp_subscription_id: String,
    gateway_private_link_service_id: String,
    ensured: Mutex<Vec<String>>,
}

impl Default for FakeEnvironment {
    fn default() -> Self {
        Self {
            local_development: false,
            features: HashSet::new(),
            rp_subscription_id: "00000000-0000-0000-0000-00000000aaaa".to_string(),
            gateway_private_link_service_id: "/subscriptions/00000000-0000-0000-0000-00000000aaaa/resourceGroups/gateway/providers/Microsoft.Network/privateLinkServices/gateway-pls-001"
                .to_string(),
            ensured: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_development(mut self) -> Self {
        self.local_development = true;
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    /// Resource group IDs passed to ensure_resource_group_role_assignment
    pub fn ensured(&self) -> Vec<String> {
        self.ensured.lock().unwrap().clone()
    }
}

#[async_trait]
impl Environment for FakeEnvironment {
    fn is_local_development_mode(&self) -> bool {
        self.local_development
    }

    fn feature_is_set(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    fn rp_subscription_id(&self) -> &str {
        &self.rp_subscription_id
    }

    fn gateway_private_link_service_id(&self) -> &str {
        &self.gateway_private_link_service_id
    }

    async fn ensure_resource_group_role_assignment(&self, resource_group_id: &str) -> Result<()> {
        self.ensured
            .lock()
            .unwrap()
            .push(resource_group_id.to_string());
        Ok(())
    }
}
