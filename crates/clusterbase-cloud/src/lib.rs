//! clusterbase cloud model
//!
//! Provider-neutral building blocks for provisioning the base infrastructure
//! of a managed cluster:
//!
//! - **error**: domain errors ([`ApiError`]) and the crate [`CloudError`]
//! - **fault**: provider error shapes and their translation ([`ProviderFault`])
//! - **provider**: client traits for resource groups, subnets, deployments
//!   and role assignments, plus the [`Environment`] seam
//! - **template**: resource descriptors and the dependency-sorted
//!   [`ResourceGraph`]
//! - **cluster** / **state**: the cluster document and its lease-guarded store
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                clusterbase (CLI)                 │
//! │        infra id / resource group / template      │
//! │           NSG attachment / subnet policy         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               clusterbase-cloud                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Client traits + ProviderFault boundary  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ResourceGraph │  │ ClusterStore │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼─────────────────┐
//! │ clusterbase-cloud-azure │
//! │   (resource manager)    │
//! └─────────────────────────┘
//! ```

pub mod cluster;
pub mod error;
pub mod fault;
pub mod provider;
pub mod state;
pub mod template;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

// Re-exports
pub use cluster::{
    ApiServerProfile, Cluster, ClusterProfile, ClusterProperties, FeatureProfile, IngressProfile,
    LoadBalancerProfile, ManagedOutboundIps, MasterProfile, NetworkProfile, OutboundType,
    PreconfiguredNsg, ResourceReference, ServicePrincipalProfile, Visibility, WorkerProfile,
};
pub use error::{ApiError, CloudError, ErrorCode, ErrorDetail, Result, STATUS_BAD_REQUEST};
pub use fault::{PolicyViolation, ProviderError, ProviderFault, ServiceError};
pub use provider::{
    Deployment, DeploymentMode, DeploymentProperties, DeploymentsClient, Environment, Feature,
    ProviderResult, ProvisioningState, ResourceGroup, ResourceGroupsClient, RoleAssignment,
    RoleAssignmentProperties, RoleAssignmentsClient, ServiceEndpoint, SubResource, Subnet,
    SubnetProperties, SubnetsClient,
};
pub use state::{
    ClusterDocument, ClusterStore, FileClusterStore, LEASE_SECONDS, MemoryClusterStore, Mutation,
};
pub use template::{Resource, ResourceGraph, ResourceRef, Template};
