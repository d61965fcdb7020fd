//! Resource manager HTTP plumbing
//!
//! Every failed exchange becomes a [`ProviderError::Detailed`] wrapping the
//! service error parsed from the response body.

use crate::auth::TokenProvider;
use crate::config::AzureConfig;
use crate::error::Result;
use clusterbase_cloud::{ProviderError, ProviderResult, ServiceError};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("clusterbase/", env!("CARGO_PKG_VERSION"));

/// Authenticated resource manager client shared by the typed clients
pub struct ArmClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    endpoint: String,
    subscription_id: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

impl ArmClient {
    pub fn new(config: AzureConfig) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            tokens: TokenProvider::new(http.clone(), &config),
            http,
            endpoint: config.resource_manager_endpoint,
            subscription_id: config.subscription_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Interval between long-running-operation polls when the service does
    /// not send `Retry-After`
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// `/subscriptions/{id}/resourcegroups/{name}`
    pub(crate) fn resource_group_path(&self, name: &str) -> String {
        format!("/subscriptions/{}/resourcegroups/{}", self.subscription_id, name)
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> ProviderResult<Response> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| ProviderError::Authentication(e.to_string()))?;

        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!("{} {}", method, url);
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(error_from_response(method.as_str(), url, response).await)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> ProviderResult<T> {
        let url = self.url(path, api_version);
        let response = self.send::<()>(Method::GET, &url, None).await?;
        decode(response).await
    }

    /// PUT and follow any long-running operation to completion
    pub(crate) async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let url = self.url(path, api_version);
        let response = self.send(Method::PUT, &url, Some(body)).await?;

        let operation = header(&response, "azure-asyncoperation");
        let location = header(&response, "location");
        let accepted = response.status() == StatusCode::ACCEPTED;
        let retry_after = retry_after(&response);
        let initial: T = decode(response).await?;

        if let Some(operation) = operation {
            self.wait_for_operation(&operation, retry_after).await?;
            return self.get_json(path, api_version).await;
        }

        if accepted && let Some(location) = location {
            self.wait_for_location(&location, retry_after).await?;
            return self.get_json(path, api_version).await;
        }

        Ok(initial)
    }

    /// PUT without following the operation; the raw response is returned
    pub(crate) async fn put_raw<B: Serialize + ?Sized>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> ProviderResult<Response> {
        let url = self.url(path, api_version);
        self.send(Method::PUT, &url, Some(body)).await
    }

    async fn wait_for_operation(
        &self,
        operation_url: &str,
        mut delay: Option<Duration>,
    ) -> ProviderResult<()> {
        loop {
            tokio::time::sleep(delay.unwrap_or(self.poll_interval)).await;

            let response = self.send::<()>(Method::GET, operation_url, None).await?;
            delay = retry_after(&response);
            let status: OperationStatus = decode(response).await?;

            match status.status.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    let error = status.error.unwrap_or_else(|| {
                        ServiceError::new(
                            status.status.clone(),
                            format!("operation {}", status.status.to_lowercase()),
                        )
                    });
                    return Err(ProviderError::Request(error));
                }
                other => tracing::debug!("Operation {} is {}", operation_url, other),
            }
        }
    }
}

impl ArmClient {
    /// `Location` polling: 202 means still running, any other success is done
    async fn wait_for_location(
        &self,
        location_url: &str,
        mut delay: Option<Duration>,
    ) -> ProviderResult<()> {
        loop {
            tokio::time::sleep(delay.unwrap_or(self.poll_interval)).await;

            let response = self.send::<()>(Method::GET, location_url, None).await?;
            if response.status() != StatusCode::ACCEPTED {
                return Ok(());
            }
            delay = retry_after(&response);
            tracing::debug!("Operation {} still running", location_url);
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    serde_json::from_str(text).map_err(|e| ProviderError::Unexpected(format!("{}: {}", e, text)))
}

async fn error_from_response(method: &str, url: &str, response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let service = ServiceError::from_body(&body).unwrap_or_else(|| {
        ServiceError::new(
            status.canonical_reason().unwrap_or("Unknown"),
            if body.is_empty() {
                status.to_string()
            } else {
                body.clone()
            },
        )
    });

    ProviderError::detailed(
        status.as_u16(),
        method,
        url,
        ProviderError::Request(service),
    )
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn retry_after(response: &Response) -> Option<Duration> {
    header(response, "retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn is_conflict(err: &ProviderError, code: &str) -> bool {
    err.status() == Some(StatusCode::CONFLICT.as_u16())
        && err.service_error().is_some_and(|s| s.code == code)
}
