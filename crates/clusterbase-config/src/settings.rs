//! Resource provider settings

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable forcing local-development mode
pub const RP_MODE_ENV: &str = "RP_MODE";
pub const DISABLE_DENY_ASSIGNMENTS_ENV: &str = "CLUSTERBASE_DISABLE_DENY_ASSIGNMENTS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub disable_deny_assignments: bool,
}

/// Identifiers of the resource provider itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpSettings {
    /// Subscription allowed to see cluster private-link services
    pub subscription_id: String,

    pub gateway_private_link_service_id: String,

    /// Service principal granted the role on every cluster resource group
    pub sp_object_id: String,
}

/// Resource manager connection. The client secret is never read from file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub resource_manager_endpoint: Option<String>,
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: Mode,
    pub features: Features,
    pub rp: RpSettings,
    pub azure: AzureSettings,
    pub state_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty file is valid and means all defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&content).map_err(|e| ConfigError::Invalid {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Apply environment overrides from a key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup(RP_MODE_ENV).is_some_and(|v| v.eq_ignore_ascii_case("development")) {
            self.mode = Mode::Development;
        }

        if let Some(value) = lookup(DISABLE_DENY_ASSIGNMENTS_ENV) {
            self.features.disable_deny_assignments =
                matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    pub fn is_local_development_mode(&self) -> bool {
        self.mode == Mode::Development
    }
}
