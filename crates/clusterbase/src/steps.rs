//! Install steps and the not-ready poll that drives them

use crate::manager::Manager;
use clusterbase_cloud::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub const NSG_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const NSG_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Poll `f` every `interval` until it reports ready.
///
/// An error from `f` ends the poll immediately. Running past `timeout`
/// yields [`CloudError::Timeout`].
pub async fn condition<F, Fut>(interval: Duration, timeout: Duration, mut f: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if f().await? {
            return Ok(());
        }

        if Instant::now() + interval > deadline {
            return Err(CloudError::Timeout(format!(
                "condition not met after {} attempts in {}s",
                attempt,
                timeout.as_secs()
            )));
        }

        tracing::warn!(
            attempt,
            delay_ms = interval.as_millis() as u64,
            "Condition not ready, retrying"
        );
        tokio::time::sleep(interval).await;
    }
}

/// One idempotent install step
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Step {
    InfraId,
    ResourceGroup,
    MasterSubnetPolicies,
    BaseResources,
    AttachNsgs,
}

impl Step {
    /// Install order
    pub const ALL: [Step; 5] = [
        Step::InfraId,
        Step::ResourceGroup,
        Step::MasterSubnetPolicies,
        Step::BaseResources,
        Step::AttachNsgs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::InfraId => "infra-id",
            Step::ResourceGroup => "resource-group",
            Step::MasterSubnetPolicies => "master-subnet-policies",
            Step::BaseResources => "base-resources",
            Step::AttachNsgs => "attach-nsgs",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Manager {
    pub async fn run_step(&mut self, step: Step) -> Result<()> {
        tracing::info!(step = %step, cluster = %self.document().key, "Running step");
        self.renew_lease().await?;
        match step {
            Step::InfraId => self.ensure_infra_id().await,
            Step::ResourceGroup => self.ensure_resource_group().await,
            Step::MasterSubnetPolicies => self.set_master_subnet_policies().await,
            Step::BaseResources => self.deploy_base_resource_template().await,
            Step::AttachNsgs => {
                condition(NSG_POLL_INTERVAL, NSG_POLL_TIMEOUT, || self.attach_nsgs()).await
            }
        }
    }

    /// Run every step in install order, stopping at the first failure
    pub async fn install(&mut self) -> Result<()> {
        for step in Step::ALL {
            self.run_step(step).await?;
        }
        tracing::info!(cluster = %self.document().key, "Base resources installed");
        Ok(())
    }
}
