//! Factorec Engine - Model Store
//!
//! Durable persistence of the active model artifact plus a short-TTL
//! in-process cache in front of it.
//!
//! The cache slot only ever holds an `Arc` to a complete artifact and is
//! swapped under an async `RwLock`; readers clone the `Arc` and release the
//! lock immediately. The clock behind the TTL is injectable so expiry can be
//! exercised without sleeping.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::{fs, sync::RwLock};
use tracing::{debug, info, instrument, warn};

use crate::artifact::ModelArtifact;
use crate::config::StoreConfig;
use factorec_common::{FactorecError, Result};

/// Monotonic time source for cache expiry
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.offset_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

/// Snapshot of the cache slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub cached: bool,
    pub expired: bool,
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
struct CachedModel {
    artifact: Arc<ModelArtifact>,
    stored_at: Instant,
}

/// TTL cache holding at most one artifact
#[derive(Debug)]
pub struct ModelCache {
    slot: RwLock<Option<CachedModel>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ModelCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            clock,
        }
    }

    /// Cached artifact, or `None` when empty or older than the TTL
    pub async fn get(&self) -> Option<Arc<ModelArtifact>> {
        let slot = self.slot.read().await;
        let cached = slot.as_ref()?;
        if self.clock.now().saturating_duration_since(cached.stored_at) < self.ttl {
            Some(Arc::clone(&cached.artifact))
        } else {
            None
        }
    }

    pub async fn put(&self, artifact: Arc<ModelArtifact>) {
        let stored_at = self.clock.now();
        *self.slot.write().await = Some(CachedModel {
            artifact,
            stored_at,
        });
    }

    pub async fn status(&self) -> CacheStatus {
        let slot = self.slot.read().await;
        let age = slot
            .as_ref()
            .map(|cached| self.clock.now().saturating_duration_since(cached.stored_at));
        CacheStatus {
            cached: slot.is_some(),
            expired: age.map(|age| age >= self.ttl).unwrap_or(false),
            age_secs: age.map(|age| age.as_secs()),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Durable storage for serialized artifacts
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Stored bytes, `None` when nothing was ever written
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored bytes atomically
    async fn write(&self, bytes: Vec<u8>) -> Result<()>;

    fn describe(&self) -> String;
}

/// Single-file storage with temp-file + rename replacement
#[derive(Debug, Clone)]
pub struct FileArtifactStorage {
    path: PathBuf,
}

impl FileArtifactStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[async_trait]
impl ArtifactStorage for FileArtifactStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FactorecError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write(&self, bytes: Vec<u8>) -> Result<()> {
        let directory = self.directory();
        fs::create_dir_all(&directory).await.map_err(|e| {
            FactorecError::Storage(format!(
                "Failed to create directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&directory, &path, &bytes))
            .await?
            .map_err(|e| {
                FactorecError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
            })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// Every writer gets its own temp file; an unpersisted one is removed on drop.
fn replace_file(directory: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Persistent artifact store with a write-through cache
pub struct ModelStore {
    storage: Arc<dyn ArtifactStorage>,
    cache: ModelCache,
}

impl fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelStore")
            .field("storage", &self.storage.describe())
            .field("cache", &self.cache)
            .finish()
    }
}

impl ModelStore {
    pub fn new(storage: Arc<dyn ArtifactStorage>, cache: ModelCache) -> Self {
        Self { storage, cache }
    }

    /// File-backed store on the system clock
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            Arc::new(FileArtifactStorage::new(config.model_path.clone())),
            ModelCache::new(config.cache_ttl(), Arc::new(SystemClock)),
        )
    }

    /// Persist `artifact` and make it the cached active model
    #[instrument(level = "debug", skip_all, fields(storage = %self.storage.describe()))]
    pub async fn save(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>> {
        let start = Instant::now();
        let artifact = Arc::new(artifact);

        let encoded = Arc::clone(&artifact);
        let bytes = tokio::task::spawn_blocking(move || encoded.encode()).await??;
        let size = bytes.len();

        self.storage.write(bytes).await?;
        self.cache.put(Arc::clone(&artifact)).await;

        info!(
            "💾 Model artifact saved ({} bytes) to {} in {:?}",
            size,
            self.storage.describe(),
            start.elapsed()
        );
        Ok(artifact)
    }

    /// Active artifact through the cache, `None` when nothing is persisted
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self) -> Result<Option<Arc<ModelArtifact>>> {
        if let Some(artifact) = self.cache.get().await {
            return Ok(Some(artifact));
        }

        let bytes = match self.storage.read().await? {
            Some(bytes) => bytes,
            None => {
                debug!("No persisted artifact at {}", self.storage.describe());
                return Ok(None);
            }
        };

        let decoded = tokio::task::spawn_blocking(move || ModelArtifact::decode(&bytes)).await?;
        let artifact = match decoded {
            Ok(artifact) => Arc::new(artifact),
            Err(e) => {
                warn!("⚠️ Persisted artifact rejected: {}", e);
                return Err(e);
            }
        };

        self.cache.put(Arc::clone(&artifact)).await;
        debug!(
            "Loaded artifact trained at {} from {}",
            artifact.metadata.trained_at,
            self.storage.describe()
        );
        Ok(Some(artifact))
    }

    pub async fn cache_status(&self) -> CacheStatus {
        self.cache.status().await
    }

    /// Human-readable location of the durable artifact
    pub fn location(&self) -> String {
        self.storage.describe()
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}
