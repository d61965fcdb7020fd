//! Per-cluster orchestration handle

use clusterbase_cloud::{
    Cluster, CloudError, ClusterDocument, ClusterStore, DeploymentsClient, Environment,
    LEASE_SECONDS, ResourceGroupsClient, Result, SubnetsClient,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Renewal period of the background lease heartbeat
pub const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(LEASE_SECONDS as u64 / 3);

/// Cloud API clients used by the base-resource steps
#[derive(Clone)]
pub struct Clients {
    pub resource_groups: Arc<dyn ResourceGroupsClient>,
    pub subnets: Arc<dyn SubnetsClient>,
    pub deployments: Arc<dyn DeploymentsClient>,
}

/// Drives the base-resource steps for one cluster.
///
/// Holds a snapshot of the cluster document; every successful patch
/// replaces it with the stored result. A manager created by [`Manager::load`]
/// renews its lease in the background until it is released or dropped.
pub struct Manager {
    doc: ClusterDocument,
    store: Arc<dyn ClusterStore>,
    env: Arc<dyn Environment>,
    clients: Clients,
    heartbeat: Option<JoinHandle<()>>,
}

impl Manager {
    pub fn new(
        doc: ClusterDocument,
        store: Arc<dyn ClusterStore>,
        env: Arc<dyn Environment>,
        clients: Clients,
    ) -> Self {
        Self {
            doc,
            store,
            env,
            clients,
            heartbeat: None,
        }
    }

    /// Load the document and take its lease
    pub async fn load(
        key: &str,
        store: Arc<dyn ClusterStore>,
        env: Arc<dyn Environment>,
        clients: Clients,
    ) -> Result<Self> {
        let doc = store.acquire_lease(&key.to_lowercase()).await?;
        tracing::debug!(cluster = %doc.key, revision = doc.revision, "Loaded cluster document");
        let heartbeat = spawn_heartbeat(store.clone(), doc.key.clone(), LEASE_RENEW_INTERVAL);
        let mut manager = Self::new(doc, store, env, clients);
        manager.heartbeat = Some(heartbeat);
        Ok(manager)
    }

    pub async fn release(mut self) -> Result<()> {
        self.stop_heartbeat();
        self.store.release_lease(&self.doc.key).await?;
        Ok(())
    }

    /// Extend the lease; fails once another holder has taken it
    pub async fn renew_lease(&mut self) -> Result<()> {
        let doc = self.store.acquire_lease(&self.doc.key).await?;
        tracing::debug!(cluster = %doc.key, expires_at = ?doc.lease_expires_at, "Renewed lease");
        self.doc = doc;
        Ok(())
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }

    pub fn document(&self) -> &ClusterDocument {
        &self.doc
    }

    pub fn cluster(&self) -> &Cluster {
        &self.doc.cluster
    }

    pub(crate) fn env(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    pub(crate) fn clients(&self) -> &Clients {
        &self.clients
    }

    /// Lease-guarded patch of the stored document
    pub(crate) async fn patch(
        &mut self,
        mutation: &(dyn Fn(&mut ClusterDocument) -> Result<()> + Send + Sync),
    ) -> Result<()> {
        self.doc = self.store.patch_with_lease(&self.doc.key, mutation).await?;
        tracing::debug!(
            cluster = %self.doc.key,
            revision = self.doc.revision,
            "Patched cluster document"
        );
        Ok(())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

/// Renew the lease every `interval` until the task is aborted or the lease
/// is lost
fn spawn_heartbeat(
    store: Arc<dyn ClusterStore>,
    key: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.acquire_lease(&key).await {
                Ok(_) => tracing::debug!(cluster = %key, "Lease heartbeat"),
                Err(err @ (CloudError::LeaseError(_) | CloudError::ClusterNotFound(_))) => {
                    tracing::warn!(cluster = %key, error = %err, "Lease lost, stopping heartbeat");
                    return;
                }
                Err(err) => {
                    tracing::warn!(cluster = %key, error = %err, "Lease heartbeat failed, retrying")
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::Step;
    use crate::testing::{TestHarness, cluster};
    use chrono::Utc;
    use clusterbase_cloud::MemoryClusterStore;

    async fn expire_lease(store: &MemoryClusterStore, key: &str, owner: &str) {
        let mut doc = store.get(key).await.unwrap();
        doc.lease_owner = Some(owner.to_string());
        doc.lease_expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.insert(doc).await;
    }

    #[tokio::test]
    async fn test_steps_survive_lease_expiry_between_patches() {
        let mut c = cluster();
        c.properties.infra_id.clear();
        let harness = TestHarness::new(c).await;
        let mut manager = harness.manager();

        manager.run_step(Step::InfraId).await.unwrap();
        let key = manager.document().key.clone();
        expire_lease(&harness.store, &key, "test-holder").await;

        manager.run_step(Step::ResourceGroup).await.unwrap();

        let stored = harness.stored().await;
        assert_eq!(stored.lease_owner.as_deref(), Some("test-holder"));
        assert!(!stored.lease_expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_step_fails_once_lease_is_taken_over() {
        let harness = TestHarness::new(cluster()).await;
        let mut manager = harness.manager();
        let key = manager.document().key.clone();

        let mut doc = harness.store.get(&key).await.unwrap();
        doc.lease_owner = Some("other-host".to_string());
        doc.lease_expires_at = Some(Utc::now() + chrono::Duration::seconds(LEASE_SECONDS));
        harness.store.insert(doc).await;

        let err = manager.run_step(Step::InfraId).await.unwrap_err();
        assert!(matches!(err, CloudError::LeaseError(_)));
        assert!(harness.resource_groups.puts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_renews_lease() {
        let harness = TestHarness::new(cluster()).await;
        let key = harness.stored().await.key;
        expire_lease(&harness.store, &key, "test-holder").await;

        let heartbeat = spawn_heartbeat(harness.store.clone(), key.clone(), LEASE_RENEW_INTERVAL);
        tokio::time::sleep(LEASE_RENEW_INTERVAL + Duration::from_secs(1)).await;

        let stored = harness.stored().await;
        assert!(!stored.lease_expired(Utc::now()));
        assert!(!heartbeat.is_finished());
        heartbeat.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_when_lease_is_lost() {
        let harness = TestHarness::new(cluster()).await;
        let key = harness.stored().await.key;

        let mut doc = harness.store.get(&key).await.unwrap();
        doc.lease_owner = Some("other-host".to_string());
        doc.lease_expires_at = Some(Utc::now() + chrono::Duration::seconds(LEASE_SECONDS));
        harness.store.insert(doc).await;

        let heartbeat = spawn_heartbeat(harness.store.clone(), key, LEASE_RENEW_INTERVAL);
        tokio::time::timeout(LEASE_RENEW_INTERVAL * 2, heartbeat)
            .await
            .unwrap()
            .unwrap();
    }
}
