//! Cloud error types
//!
//! [`ApiError`] is the user-facing error a cluster operation ends with: an
//! HTTP-style status, a stable code and optional detail entries. Everything
//! else in [`CloudError`] is infrastructure failure propagated as-is.

use crate::fault::ProviderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATUS_BAD_REQUEST: u16 = 400;

/// Stable error codes surfaced to the cluster owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    ClusterResourceGroupAlreadyExists,
    DeploymentFailed,
    InvalidLinkedVNet,
    RequestDisallowedByPolicy,
    InvalidParameter,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ClusterResourceGroupAlreadyExists => "ClusterResourceGroupAlreadyExists",
            ErrorCode::DeploymentFailed => "DeploymentFailed",
            ErrorCode::InvalidLinkedVNet => "InvalidLinkedVNet",
            ErrorCode::RequestDisallowedByPolicy => "RequestDisallowedByPolicy",
            ErrorCode::InvalidParameter => "InvalidParameter",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured detail entry attached to an [`ApiError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,

    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Domain error returned to the cluster owner
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{status_code}: {code}: {}: {message}", .target.as_deref().unwrap_or_default())]
pub struct ApiError {
    #[serde(skip)]
    pub status_code: u16,

    pub code: ErrorCode,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

impl ApiError {
    pub fn new(
        status_code: u16,
        code: ErrorCode,
        target: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            code,
            message: message.into(),
            target,
            details: Vec::new(),
        }
    }

    pub fn bad_request(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(STATUS_BAD_REQUEST, code, None, message)
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.details.push(detail);
        self
    }

    /// Wire form: `{"error": {...}}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self })
    }
}

/// Cloud orchestration errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate resource in template: {0}")]
    DuplicateResource(String),

    #[error("Resource {resource} depends on undeclared resource {dependency}")]
    UnknownDependency {
        resource: String,
        dependency: String,
    },

    #[error("Dependency cycle between resources: {0}")]
    DependencyCycle(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lease error: {0}")]
    LeaseError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Revision conflict on {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// The domain error, if this is one
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            CloudError::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.api_error().map(|e| e.code)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
