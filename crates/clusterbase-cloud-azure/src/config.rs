//! Client configuration

use crate::error::{AzureError, Result};

pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// How the client authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Pre-acquired bearer token
    AccessToken(String),

    /// OAuth2 client-credentials grant
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub resource_manager_endpoint: String,
    pub authority_host: String,
    pub subscription_id: String,
    pub credential: Credential,
}

impl AzureConfig {
    /// Create AzureConfig from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup using the environment variable names:
    /// `AZURE_SUBSCRIPTION_ID`, then either `AZURE_ACCESS_TOKEN` or
    /// `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AzureError::MissingEnvVar(key.to_string()))
        };

        let subscription_id = required("AZURE_SUBSCRIPTION_ID")?;

        let credential = match lookup("AZURE_ACCESS_TOKEN").filter(|t| !t.is_empty()) {
            Some(token) => Credential::AccessToken(token),
            None => Credential::ClientSecret {
                tenant_id: required("AZURE_TENANT_ID")?,
                client_id: required("AZURE_CLIENT_ID")?,
                client_secret: required("AZURE_CLIENT_SECRET")?,
            },
        };

        let resource_manager_endpoint = lookup("AZURE_RESOURCE_MANAGER_ENDPOINT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string());
        let authority_host = lookup("AZURE_AUTHORITY_HOST")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());

        for endpoint in [&resource_manager_endpoint, &authority_host] {
            if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                return Err(AzureError::InvalidConfig(format!(
                    "endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }
        }

        Ok(Self {
            resource_manager_endpoint: resource_manager_endpoint.trim_end_matches('/').to_string(),
            authority_host: authority_host.trim_end_matches('/').to_string(),
            subscription_id,
            credential,
        })
    }

    /// Config with a static token, for tests and pre-authenticated callers
    pub fn with_token(
        endpoint: impl Into<String>,
        subscription_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            resource_manager_endpoint: endpoint.into().trim_end_matches('/').to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            subscription_id: subscription_id.into(),
            credential: Credential::AccessToken(token.into()),
        }
    }

    /// OAuth2 scope for the resource manager audience
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource_manager_endpoint)
    }
}
