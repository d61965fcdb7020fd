//! Bearer token acquisition

use crate::config::{AzureConfig, Credential};
use crate::error::{AzureError, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub(crate) struct TokenProvider {
    http: reqwest::Client,
    credential: Credential,
    authority_host: String,
    scope: String,
    cache: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl TokenProvider {
    pub(crate) fn new(http: reqwest::Client, config: &AzureConfig) -> Self {
        Self {
            http,
            credential: config.credential.clone(),
            authority_host: config.authority_host.clone(),
            scope: config.scope(),
            cache: Mutex::new(None),
        }
    }

    pub(crate) async fn token(&self) -> Result<String> {
        let (tenant_id, client_id, client_secret) = match &self.credential {
            Credential::AccessToken(token) => return Ok(token.clone()),
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => (tenant_id, client_id, client_secret),
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.value.clone());
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant_id);
        tracing::debug!("Requesting token from {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::TokenRequest(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);

        *cache = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at,
        });

        Ok(token.access_token)
    }
}
