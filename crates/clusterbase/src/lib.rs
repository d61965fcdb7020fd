//! clusterbase - base resource deployment for managed clusters
//!
//! Drives the idempotent steps that lay down a cluster's foundational
//! infrastructure in its own resource group:
//!
//! 1. **infra id**: write-once cluster infrastructure identifier
//! 2. **resource group**: create or adopt the cluster resource group
//! 3. **master subnet policies**: open the master subnet to private link
//! 4. **base resources**: storage, NSG, load balancers and access bindings
//!    in a single dependency-ordered deployment
//! 5. **NSG attachment**: polled until the new NSG is visible to the
//!    network API
//!
//! Each step is a [`Manager`] method and may be re-run after a partial
//! failure.

pub mod base_resources;
pub mod environment;
pub mod infra_id;
pub mod manager;
pub mod master_subnet;
pub mod nsg;
pub mod resource_group;
pub mod resources;
pub mod steps;
pub mod subnet;

#[cfg(test)]
mod testing;

pub use base_resources::{BASE_DEPLOYMENT_NAME, STORAGE_SERVICE_ENDPOINT};
pub use environment::SettingsEnvironment;
pub use infra_id::{INFRA_ID_MAX_LEN, INFRA_ID_RANDOM_LEN, generate_infra_id};
pub use manager::{Clients, Manager};
pub use nsg::network_security_group_id;
pub use steps::{Step, condition};
