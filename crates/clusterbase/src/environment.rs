//! Runtime environment backed by the settings file

use async_trait::async_trait;
use clusterbase_cloud::{
    CloudError, Environment, Feature, Result, RoleAssignment, RoleAssignmentProperties,
    RoleAssignmentsClient,
};
use clusterbase_config::Settings;
use std::sync::Arc;

/// Built-in Owner role
pub const OWNER_ROLE_ID: &str = "8e3af657-a8ff-443c-a75c-2fe8c4bcb635";

const ROLE_ASSIGNMENT_EXISTS: &str = "RoleAssignmentExists";

pub struct SettingsEnvironment {
    settings: Settings,
    role_assignments: Arc<dyn RoleAssignmentsClient>,
}

impl SettingsEnvironment {
    pub fn new(settings: Settings, role_assignments: Arc<dyn RoleAssignmentsClient>) -> Self {
        Self {
            settings,
            role_assignments,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Subscription segment of a resource id
fn subscription_of(resource_id: &str) -> Option<&str> {
    let mut segments = resource_id.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some(key), Some(id)) if key.eq_ignore_ascii_case("subscriptions") && !id.is_empty() => {
            Some(id)
        }
        _ => None,
    }
}

#[async_trait]
impl Environment for SettingsEnvironment {
    fn is_local_development_mode(&self) -> bool {
        self.settings.is_local_development_mode()
    }

    fn feature_is_set(&self, feature: Feature) -> bool {
        match feature {
            Feature::DisableDenyAssignments => self.settings.features.disable_deny_assignments,
        }
    }

    fn rp_subscription_id(&self) -> &str {
        &self.settings.rp.subscription_id
    }

    fn gateway_private_link_service_id(&self) -> &str {
        &self.settings.rp.gateway_private_link_service_id
    }

    async fn ensure_resource_group_role_assignment(&self, resource_group_id: &str) -> Result<()> {
        let principal_id = &self.settings.rp.sp_object_id;
        if principal_id.is_empty() {
            return Err(CloudError::InvalidConfig(
                "rp.sp_object_id is required to grant resource group access".to_string(),
            ));
        }

        let subscription_id = subscription_of(resource_group_id).ok_or_else(|| {
            CloudError::InvalidConfig(format!("invalid resource group id: {}", resource_group_id))
        })?;

        let assignment = RoleAssignment {
            id: None,
            properties: RoleAssignmentProperties {
                role_definition_id: format!(
                    "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{}",
                    subscription_id, OWNER_ROLE_ID
                ),
                principal_id: principal_id.clone(),
                principal_type: Some("ServicePrincipal".to_string()),
            },
        };
        let name = uuid::Uuid::new_v4().to_string();

        match self
            .role_assignments
            .create(resource_group_id, &name, &assignment)
            .await
        {
            Ok(_) => {
                tracing::info!(resource_group_id, principal_id = %principal_id, "Created role assignment");
                Ok(())
            }
            Err(err)
                if err.status() == Some(409)
                    && err
                        .service_error()
                        .is_some_and(|s| s.code == ROLE_ASSIGNMENT_EXISTS) =>
            {
                tracing::debug!(resource_group_id, "Role assignment already present");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
