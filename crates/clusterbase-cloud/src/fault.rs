//! Provider error shapes and their translation into faults
//!
//! API clients return [`ProviderError`]. A service error from the resource
//! manager can arrive either wrapped in a [`ProviderError::Detailed`] (which
//! adds the HTTP exchange) or bare as [`ProviderError::Request`]. Callers
//! never walk these shapes themselves: [`ProviderError::fault`] classifies an
//! error into the closed [`ProviderFault`] set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

pub const POLICY_DENIED_CODE: &str = "RequestDisallowedByPolicy";

const INVALID_REFERENCE_CODE: &str = "InvalidResourceReference";

static NSG_NOT_READY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("Resource.*networkSecurityGroups.*referenced by resource.*not found")
        .expect("static regex")
});

static POLICY_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"policyDefinitionName\\?"\s*:\s*\\?"([^"\\]+)"#).expect("static regex")
});

static POLICY_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"policyAssignmentName\\?"\s*:\s*\\?"([^"\\]+)"#).expect("static regex")
});

/// Resource-manager error body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_info: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<serde_json::Value>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Parse a `{"error": {...}}` response body
    pub fn from_body(body: &str) -> Option<Self> {
        #[derive(Deserialize)]
        struct Envelope {
            error: ServiceError,
        }

        serde_json::from_str::<Envelope>(body).ok().map(|e| e.error)
    }

    pub fn with_additional_info(mut self, info: serde_json::Value) -> Self {
        self.additional_info.push(info);
        self
    }
}

/// Errors returned by cloud API clients
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("{method} {url}: StatusCode={status} -- Original Error: {source}")]
    Detailed {
        status: u16,
        method: String,
        url: String,
        source: Box<ProviderError>,
    },

    #[error("Code=\"{}\" Message=\"{}\"", .0.code, .0.message)]
    Request(ServiceError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// Closed classification of provider errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFault {
    /// The addressed resource does not exist
    NotFound,

    /// A governance policy rejected the request
    PolicyDenied {
        /// Service error payload, or the raw message when there is none
        raw: String,
        violation: Option<PolicyViolation>,
    },

    /// A resource referenced by the request is not yet visible
    Transient,

    Other,
}

impl ProviderError {
    pub fn detailed(
        status: u16,
        method: impl Into<String>,
        url: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        ProviderError::Detailed {
            status,
            method: method.into(),
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn request(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Request(ServiceError::new(code, message))
    }

    /// HTTP status of the outermost detailed wrapper
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Detailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The nested service error, whichever shape carries it
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            ProviderError::Detailed { source, .. } => source.service_error(),
            ProviderError::Request(service) => Some(service),
            _ => None,
        }
    }

    /// Underlying message text with any service payload serialized in full
    pub fn raw_message(&self) -> String {
        match self {
            ProviderError::Detailed { source, .. } => source.raw_message(),
            ProviderError::Request(service) => {
                serde_json::to_string(service).unwrap_or_else(|_| service.message.clone())
            }
            other => other.to_string(),
        }
    }

    pub fn fault(&self) -> ProviderFault {
        let service = self.service_error();

        if self.status() == Some(404)
            || service.is_some_and(|s| {
                matches!(s.code.as_str(), "NotFound" | "ResourceNotFound" | "ResourceGroupNotFound")
            })
        {
            return ProviderFault::NotFound;
        }

        let raw = self.raw_message();
        if service.is_some_and(|s| s.code == POLICY_DENIED_CODE) || raw.contains(POLICY_DENIED_CODE)
        {
            let violation = PolicyViolation::parse(&raw);
            let raw = match service {
                Some(s) => serde_json::to_string(s).unwrap_or(raw),
                None => raw,
            };
            return ProviderFault::PolicyDenied { raw, violation };
        }

        let transient = match service {
            Some(s) if !s.code.is_empty() => {
                s.code == INVALID_REFERENCE_CODE && NSG_NOT_READY.is_match(&s.message)
            }
            _ => NSG_NOT_READY.is_match(&raw),
        };
        if transient {
            return ProviderFault::Transient;
        }

        ProviderFault::Other
    }
}

/// Policy definition and assignment named in a policy rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    pub definition: String,
    pub assignment: String,
}

impl PolicyViolation {
    /// Extract both names from raw error text.
    ///
    /// Returns `None` unless both are present; callers then surface the raw
    /// text unchanged.
    pub fn parse(raw: &str) -> Option<Self> {
        let definition = POLICY_DEFINITION.captures(raw)?.get(1)?.as_str();
        let assignment = POLICY_ASSIGNMENT.captures(raw)?.get(1)?.as_str();
        Some(Self {
            definition: definition.to_string(),
            assignment: assignment.to_string(),
        })
    }
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Policy definition : {}\nPolicy Assignment : {}",
            self.definition, self.assignment
        )
    }
}
