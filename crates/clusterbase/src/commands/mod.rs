pub mod import;
pub mod infra_id;
pub mod install;
pub mod step;
pub mod template;

use anyhow::Context;
use clusterbase::{Clients, Manager, SettingsEnvironment};
use clusterbase_cloud::FileClusterStore;
use clusterbase_cloud_azure::{AzureClients, AzureConfig};
use clusterbase_config::Settings;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Resolved settings plus command-line overrides for one invocation
pub struct Session {
    settings: Settings,
    state_dir: PathBuf,
    cluster: Option<String>,
}

impl Session {
    pub fn new(settings: Settings, state_dir: Option<PathBuf>, cluster: Option<String>) -> Self {
        let state_dir = state_dir
            .or_else(|| settings.state_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            settings,
            state_dir,
            cluster,
        }
    }

    pub fn store(&self) -> Arc<FileClusterStore> {
        Arc::new(FileClusterStore::for_host(&self.state_dir))
    }

    fn cluster_key(&self) -> anyhow::Result<&str> {
        self.cluster
            .as_deref()
            .context("no cluster selected: pass --cluster or set CLUSTERBASE_CLUSTER")
    }

    /// Environment variables win over the settings file `azure` section
    fn azure_config(&self) -> anyhow::Result<AzureConfig> {
        let azure = &self.settings.azure;
        let from_settings = |key: &str| match key {
            "AZURE_SUBSCRIPTION_ID" => azure.subscription_id.clone(),
            "AZURE_TENANT_ID" => azure.tenant_id.clone(),
            "AZURE_CLIENT_ID" => azure.client_id.clone(),
            "AZURE_RESOURCE_MANAGER_ENDPOINT" => azure.resource_manager_endpoint.clone(),
            _ => None,
        };
        let config = AzureConfig::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| from_settings(key))
        })?;
        Ok(config)
    }

    /// Connect to the resource manager and take the cluster lease
    pub async fn manager(&self) -> anyhow::Result<Manager> {
        let key = self.cluster_key()?;
        let azure = AzureClients::new(self.azure_config()?)?;
        let env = Arc::new(SettingsEnvironment::new(
            self.settings.clone(),
            azure.role_assignments.clone(),
        ));
        let clients = Clients {
            resource_groups: azure.resource_groups.clone(),
            subnets: azure.subnets.clone(),
            deployments: azure.deployments.clone(),
        };

        let manager = Manager::load(key, self.store(), env, clients)
            .await
            .with_context(|| format!("failed to load cluster {}", key))?;
        let doc = manager.document();
        tracing::info!(
            cluster = %doc.key,
            holder = doc.lease_owner.as_deref().unwrap_or_default(),
            "Cluster lease acquired"
        );
        Ok(manager)
    }
}

/// Release the lease whatever the outcome, then report the outcome
pub async fn finish(manager: Manager, result: clusterbase_cloud::Result<()>) -> anyhow::Result<()> {
    let released = manager.release().await;
    if let Err(err) = &result
        && let Some(api) = err.api_error()
    {
        eprintln!("{} {}: {}", "✗".red().bold(), api.code, api.message);
        for detail in &api.details {
            eprintln!("  {}", detail.message.dimmed());
        }
    }
    result?;
    released?;
    Ok(())
}
