//! Role assignments

use crate::client::ArmClient;
use async_trait::async_trait;
use clusterbase_cloud::{ProviderResult, RoleAssignment, RoleAssignmentsClient};
use std::sync::Arc;

pub const AUTHORIZATION_API_VERSION: &str = "2018-09-01-preview";

pub struct RoleAssignments {
    client: Arc<ArmClient>,
}

impl RoleAssignments {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoleAssignmentsClient for RoleAssignments {
    async fn create(
        &self,
        scope: &str,
        name: &str,
        assignment: &RoleAssignment,
    ) -> ProviderResult<RoleAssignment> {
        let path = format!(
            "{}/providers/Microsoft.Authorization/roleAssignments/{}",
            scope.trim_end_matches('/'),
            name
        );
        tracing::info!(scope, name, "Creating role assignment");
        self.client
            .put_json(&path, AUTHORIZATION_API_VERSION, assignment)
            .await
    }
}
