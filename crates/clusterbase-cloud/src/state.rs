//! Durable cluster state
//!
//! A [`ClusterDocument`] wraps the cluster with a revision counter and a
//! lease. Mutations go through [`ClusterStore::patch_with_lease`]: the
//! document is re-read, the mutation applied, and the result written only if
//! the revision is unchanged. Conflicts are retried a bounded number of
//! times, so mutation functions must be idempotent.
//!
//! A lease stays with its owner until another holder takes it. An expired
//! lease nobody has claimed is renewed by the owner's next patch.

use crate::cluster::Cluster;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const STATE_DIR: &str = ".clusterbase";
const CLUSTERS_DIR: &str = "clusters";
const STALE_LOCK_SECONDS: i64 = 60;
const PATCH_ATTEMPTS: u32 = 5;
const LOCK_ATTEMPTS: u32 = 20;
const LOCK_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

/// How long a lease lasts without renewal
pub const LEASE_SECONDS: i64 = 60;

/// A mutation applied to a freshly read document
pub type Mutation<'a> = &'a (dyn Fn(&mut ClusterDocument) -> Result<()> + Send + Sync);

/// Cluster plus store bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDocument {
    pub key: String,

    /// Incremented on every write
    #[serde(default)]
    pub revision: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,

    pub cluster: Cluster,
}

impl ClusterDocument {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            key: cluster.id.to_lowercase(),
            revision: 0,
            lease_owner: None,
            lease_expires_at: None,
            updated_at: Utc::now(),
            cluster,
        }
    }

    fn lease_held_by_other(&self, holder: &str, now: DateTime<Utc>) -> bool {
        match (&self.lease_owner, self.lease_expires_at) {
            (Some(owner), Some(expires)) => owner != holder && expires > now,
            _ => false,
        }
    }

    /// Whether the lease has lapsed at `now`
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at.is_none_or(|e| e <= now)
    }
}

/// Lease-guarded, optimistic-concurrency document store
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<ClusterDocument>;

    /// Take (or renew) the lease on a document for this store's holder
    async fn acquire_lease(&self, key: &str) -> Result<ClusterDocument>;

    async fn release_lease(&self, key: &str) -> Result<ClusterDocument>;

    /// Apply `mutation` to the current document while holding the lease
    async fn patch_with_lease(&self, key: &str, mutation: Mutation<'_>) -> Result<ClusterDocument>;
}

fn lease_mutation(holder: &str) -> impl Fn(&mut ClusterDocument) -> Result<()> + Send + Sync + '_ {
    move |doc| {
        let now = Utc::now();
        if doc.lease_held_by_other(holder, now) {
            return Err(CloudError::LeaseError(format!(
                "{} is leased by {}",
                doc.key,
                doc.lease_owner.as_deref().unwrap_or_default()
            )));
        }
        doc.lease_owner = Some(holder.to_string());
        doc.lease_expires_at = Some(now + Duration::seconds(LEASE_SECONDS));
        Ok(())
    }
}

fn release_mutation(
    holder: &str,
) -> impl Fn(&mut ClusterDocument) -> Result<()> + Send + Sync + '_ {
    move |doc| {
        if doc.lease_owner.as_deref() == Some(holder) {
            doc.lease_owner = None;
            doc.lease_expires_at = None;
        }
        Ok(())
    }
}

/// Apply a leased patch: the holder must own the lease, which is renewed
fn leased(holder: &str, mutation: Mutation<'_>, doc: &mut ClusterDocument) -> Result<()> {
    let now = Utc::now();
    if doc.lease_owner.as_deref() != Some(holder) {
        return Err(CloudError::LeaseError(format!(
            "{} is not leased by {}",
            doc.key, holder
        )));
    }
    if doc.lease_expired(now) {
        tracing::debug!(key = %doc.key, holder, "Renewing expired lease");
    }
    mutation(doc)?;
    doc.lease_expires_at = Some(now + Duration::seconds(LEASE_SECONDS));
    Ok(())
}

/// File-backed store: one JSON document per cluster under
/// `<root>/.clusterbase/clusters/`
pub struct FileClusterStore {
    project_root: PathBuf,
    holder: String,
}

impl FileClusterStore {
    pub fn new(project_root: impl AsRef<Path>, holder: impl Into<String>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            holder: holder.into(),
        }
    }

    /// Store whose lease holder is this host
    pub fn for_host(project_root: impl AsRef<Path>) -> Self {
        let holder = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self::new(project_root, format!("{}-{}", holder, std::process::id()))
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    fn clusters_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR).join(CLUSTERS_DIR)
    }

    fn file_stem(key: &str) -> String {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect()
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.clusters_dir().join(format!("{}.json", Self::file_stem(key)))
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.clusters_dir().join(format!("{}.json.backup", Self::file_stem(key)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.clusters_dir().join(format!("{}.lock", Self::file_stem(key)))
    }

    async fn ensure_clusters_dir(&self) -> Result<()> {
        let dir = self.clusters_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Insert a new document; fails if one already exists for the key
    pub async fn create(&self, doc: &ClusterDocument) -> Result<()> {
        let lock = self.acquire_lock(&doc.key).await?;
        if self.document_path(&doc.key).exists() {
            lock.release().await?;
            return Err(CloudError::StateError(format!(
                "cluster document {} already exists",
                doc.key
            )));
        }
        self.write(doc).await?;
        lock.release().await
    }

    async fn read(&self, key: &str) -> Result<ClusterDocument> {
        let path = self.document_path(key);
        if !path.exists() {
            return Err(CloudError::ClusterNotFound(key.to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write(&self, doc: &ClusterDocument) -> Result<()> {
        let path = self.document_path(&doc.key);
        let backup = self.backup_path(&doc.key);

        if path.exists() {
            fs::copy(&path, &backup).await?;
        }

        // readers outside the lock must never see a partial document
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(doc)?).await?;
        fs::rename(&staging, &path).await?;

        tracing::debug!(key = %doc.key, revision = doc.revision, "Saved cluster document");
        Ok(())
    }

    /// Exclusive write section for one document.
    ///
    /// The lock file is created with `create_new`, so exactly one holder
    /// wins. A busy lock is retried briefly; a stale one is removed.
    async fn acquire_lock(&self, key: &str) -> Result<StateLock> {
        self.ensure_clusters_dir().await?;
        let lock_path = self.lock_path(key);

        for attempt in 1..=LOCK_ATTEMPTS {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;

            match created {
                Ok(mut file) => {
                    let lock_info = LockInfo {
                        holder: self.holder.clone(),
                        acquired_at: Utc::now(),
                    };
                    let lock = StateLock {
                        lock_path,
                        released: false,
                    };
                    file.write_all(serde_json::to_string_pretty(&lock_info)?.as_bytes())
                        .await?;
                    file.flush().await?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(info) = read_lock_info(&lock_path).await
                        && Utc::now().signed_duration_since(info.acquired_at).num_seconds()
                            >= STALE_LOCK_SECONDS
                    {
                        tracing::warn!("Removing stale lock from {}", info.holder);
                        remove_lock_file(&lock_path).await?;
                        continue;
                    }
                    tracing::debug!(key, attempt, "Lock busy, retrying");
                    tokio::time::sleep(LOCK_RETRY_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let holder = read_lock_info(&lock_path)
            .await
            .map(|info| format!("{} since {}", info.holder, info.acquired_at))
            .unwrap_or_else(|| "another writer".to_string());
        Err(CloudError::LockError(format!("{} is locked by {}", key, holder)))
    }

    /// Read, mutate, then write under the lock if the revision still matches
    async fn patch(
        &self,
        key: &str,
        mutation: &(dyn Fn(&mut ClusterDocument) -> Result<()> + Send + Sync),
    ) -> Result<ClusterDocument> {
        for attempt in 1..=PATCH_ATTEMPTS {
            let mut doc = self.read(key).await?;
            let revision = doc.revision;
            mutation(&mut doc)?;

            let lock = self.acquire_lock(key).await?;
            let current = self.read(key).await?;
            if current.revision != revision {
                lock.release().await?;
                tracing::debug!(key, attempt, "Revision conflict, retrying patch");
                continue;
            }

            doc.revision = revision + 1;
            doc.updated_at = Utc::now();
            self.write(&doc).await?;
            lock.release().await?;
            return Ok(doc);
        }

        Err(CloudError::Conflict(key.to_string()))
    }
}

#[async_trait]
impl ClusterStore for FileClusterStore {
    async fn get(&self, key: &str) -> Result<ClusterDocument> {
        self.read(key).await
    }

    async fn acquire_lease(&self, key: &str) -> Result<ClusterDocument> {
        self.patch(key, &lease_mutation(&self.holder)).await
    }

    async fn release_lease(&self, key: &str) -> Result<ClusterDocument> {
        self.patch(key, &release_mutation(&self.holder)).await
    }

    async fn patch_with_lease(&self, key: &str, mutation: Mutation<'_>) -> Result<ClusterDocument> {
        let holder = self.holder.as_str();
        self.patch(key, &|doc: &mut ClusterDocument| leased(holder, mutation, doc))
            .await
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// `None` while the file is missing or still being written
async fn read_lock_info(lock_path: &Path) -> Option<LockInfo> {
    let content = fs::read_to_string(lock_path).await.ok()?;
    serde_json::from_str(&content).ok()
}

async fn remove_lock_file(lock_path: &Path) -> Result<()> {
    match fs::remove_file(lock_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// RAII guard for a document lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            remove_lock_file(&self.lock_path).await?;
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

/// In-process store
pub struct MemoryClusterStore {
    holder: String,
    docs: Mutex<HashMap<String, ClusterDocument>>,
}

impl MemoryClusterStore {
    pub fn new(holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            docs: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, doc: ClusterDocument) {
        self.docs.lock().await.insert(doc.key.clone(), doc);
    }

    async fn patch(
        &self,
        key: &str,
        mutation: &(dyn Fn(&mut ClusterDocument) -> Result<()> + Send + Sync),
    ) -> Result<ClusterDocument> {
        let mut docs = self.docs.lock().await;
        let current = docs
            .get(key)
            .ok_or_else(|| CloudError::ClusterNotFound(key.to_string()))?;

        let mut doc = current.clone();
        mutation(&mut doc)?;
        doc.revision += 1;
        doc.updated_at = Utc::now();
        docs.insert(key.to_string(), doc.clone());
        Ok(doc)
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn get(&self, key: &str) -> Result<ClusterDocument> {
        self.docs
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| CloudError::ClusterNotFound(key.to_string()))
    }

    async fn acquire_lease(&self, key: &str) -> Result<ClusterDocument> {
        self.patch(key, &lease_mutation(&self.holder)).await
    }

    async fn release_lease(&self, key: &str) -> Result<ClusterDocument> {
        self.patch(key, &release_mutation(&self.holder)).await
    }

    async fn patch_with_lease(&self, key: &str, mutation: Mutation<'_>) -> Result<ClusterDocument> {
        let holder = self.holder.as_str();
        self.patch(key, &|doc: &mut ClusterDocument| leased(holder, mutation, doc))
            .await
    }
}
