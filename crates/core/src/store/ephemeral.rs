//! TTL store with dual-path eviction.

use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::StoreConfig;
use super::error::StoreError;
use super::types::{EvictionPath, StoreStats, TempObject};
use crate::media::MediaFormat;
use crate::metrics;

/// Generates a new opaque id: 16 CSPRNG bytes, lower-case hex.
pub fn generate_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

struct Shared {
    entries: RwLock<HashMap<String, TempObject>>,
    timer_evictions: AtomicU64,
    sweep_evictions: AtomicU64,
}

impl Shared {
    /// Removes `id` if present and deletes its files. Returns whether this
    /// call performed the removal.
    async fn evict(&self, id: &str, path: EvictionPath) -> bool {
        let removed = self.entries.write().await.remove(id);
        let Some(object) = removed else {
            return false;
        };

        self.record(path, 1);
        delete_files(&object.files()).await;
        debug!(id = %id, path = path.as_str(), "Evicted expired object");
        true
    }

    /// Removes every expired entry and deletes their files.
    async fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<TempObject> = {
            let mut entries = self.entries.write().await;
            let ids: Vec<String> = entries
                .iter()
                .filter(|(_, object)| object.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        if expired.is_empty() {
            return 0;
        }

        self.record(EvictionPath::Sweep, expired.len() as u64);
        for object in &expired {
            delete_files(&object.files()).await;
        }
        info!(count = expired.len(), "Sweep evicted expired objects");
        expired.len()
    }

    fn record(&self, path: EvictionPath, count: u64) {
        let counter = match path {
            EvictionPath::Timer => &self.timer_evictions,
            EvictionPath::Sweep => &self.sweep_evictions,
        };
        counter.fetch_add(count, Ordering::Relaxed);
        metrics::STORE_EVICTIONS
            .with_label_values(&[path.as_str()])
            .inc_by(count);
    }
}

/// Deletes files, treating "already gone" as success.
async fn delete_files(files: &[PathBuf]) {
    for file in files {
        match tokio::fs::remove_file(file).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %file.display(), error = %e, "Failed to delete file"),
        }
    }
}

/// Memory-resident map from opaque id to [`TempObject`].
///
/// The map is only touched under its lock; file deletion always happens
/// after the lock is released.
pub struct EphemeralStore {
    dir: PathBuf,
    ttl: Duration,
    sweep_interval: Duration,
    shared: Arc<Shared>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl EphemeralStore {
    /// Creates the store directory and starts the periodic sweep.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let ttl = config.ttl();
        let sweep_interval = config.sweep_interval();
        Self::open_with_timing(config.dir, ttl, sweep_interval).await
    }

    /// Like [`open`](Self::open) with explicit durations, allowing
    /// sub-second TTLs.
    pub async fn open_with_timing(
        dir: impl Into<PathBuf>,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Result<Self, StoreError> {
        let now = Instant::now();
        if ttl.is_zero()
            || sweep_interval.is_zero()
            || now.checked_add(ttl).is_none()
            || now.checked_add(sweep_interval).is_none()
        {
            return Err(StoreError::InvalidTiming { ttl, sweep_interval });
        }

        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::DirectoryFailed {
                path: dir.clone(),
                source,
            })?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let store = Self {
            dir,
            ttl,
            sweep_interval,
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                timer_evictions: AtomicU64::new(0),
                sweep_evictions: AtomicU64::new(0),
            }),
            running: AtomicBool::new(true),
            shutdown_tx,
        };
        store.spawn_sweeper();

        info!(
            dir = %store.dir.display(),
            ttl_secs = ttl.as_secs_f64(),
            sweep_interval_secs = sweep_interval.as_secs_f64(),
            "Ephemeral store opened"
        );
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path for a scratch file inside the store directory.
    pub fn scratch_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Registers `artifact` (and optionally its `source`) under a fresh id
    /// and schedules its deletion after the TTL.
    pub async fn store(
        &self,
        artifact: &Path,
        source: Option<&Path>,
        format: MediaFormat,
    ) -> Result<TempObject, StoreError> {
        self.insert(artifact, source, format, true).await
    }

    async fn insert(
        &self,
        artifact: &Path,
        source: Option<&Path>,
        format: MediaFormat,
        schedule_timer: bool,
    ) -> Result<TempObject, StoreError> {
        let metadata =
            tokio::fs::metadata(artifact)
                .await
                .map_err(|source| StoreError::ArtifactMissing {
                    path: artifact.to_path_buf(),
                    source,
                })?;

        let id = generate_id();
        let created_at = Utc::now();
        let deadline = Instant::now()
            .checked_add(self.ttl)
            .ok_or(StoreError::InvalidTiming {
                ttl: self.ttl,
                sweep_interval: self.sweep_interval,
            })?;
        let expires_at = created_at
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());

        let object = TempObject {
            id: id.clone(),
            artifact_path: artifact.to_path_buf(),
            source_path: source.map(Path::to_path_buf),
            media_kind: format.kind(),
            format,
            created_at,
            expires_at,
            size_bytes: metadata.len(),
            deadline,
        };

        self.shared
            .entries
            .write()
            .await
            .insert(id.clone(), object.clone());

        if schedule_timer {
            let shared = Arc::clone(&self.shared);
            let timer_id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                shared.evict(&timer_id, EvictionPath::Timer).await;
            });
        }

        info!(
            id = %id,
            kind = %object.media_kind,
            size_bytes = object.size_bytes,
            expires_at = %object.expires_at,
            "Stored object"
        );
        Ok(object)
    }

    /// Returns the object if it exists and has not expired.
    pub async fn get(&self, id: &str) -> Option<TempObject> {
        let entries = self.shared.entries.read().await;
        entries
            .get(id)
            .filter(|object| !object.is_expired())
            .cloned()
    }

    /// Number of logically live entries.
    pub async fn len(&self) -> usize {
        let entries = self.shared.entries.read().await;
        entries.values().filter(|o| !o.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> StoreStats {
        let (entries, total_bytes) = {
            let entries = self.shared.entries.read().await;
            entries
                .values()
                .filter(|o| !o.is_expired())
                .fold((0usize, 0u64), |(n, bytes), o| (n + 1, bytes + o.size_bytes))
        };

        StoreStats {
            entries,
            total_bytes,
            ttl_secs: self.ttl.as_secs(),
            sweep_interval_secs: self.sweep_interval.as_secs(),
            timer_evictions: self.shared.timer_evictions.load(Ordering::Relaxed),
            sweep_evictions: self.shared.sweep_evictions.load(Ordering::Relaxed),
        }
    }

    /// Stops the periodic sweep. Scheduled per-object deletions still run.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        info!("Ephemeral store sweep stopped");
    }

    fn spawn_sweeper(&self) {
        let shared = Arc::clone(&self.shared);
        let interval = self.sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Sweep loop received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        shared.sweep().await;
                    }
                }
            }
        });
    }
}

impl Drop for EphemeralStore {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![7u8; 256]).unwrap();
        path
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_id_no_collisions_concurrently() {
        let threads: Vec<_> = (0..10)
            .map(|_| std::thread::spawn(|| (0..10_000).map(|_| generate_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::with_capacity(100_000);
        for t in threads {
            for id in t.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 100_000);
    }

    #[tokio::test]
    async fn test_store_then_get() {
        let tmp = TempDir::new().unwrap();
        let store = EphemeralStore::open_with_timing(tmp.path(), HOUR, HOUR)
            .await
            .unwrap();
        let artifact = write_file(tmp.path(), "out.mp3");
        let source = write_file(tmp.path(), "in.original.mp3");

        let stored = store
            .store(&artifact, Some(&source), MediaFormat::Mp3)
            .await
            .unwrap();
        let fetched = store.get(&stored.id).await.unwrap();

        assert_eq!(fetched.id, stored.id);
        assert_eq!(fetched.artifact_path, artifact);
        assert_eq!(fetched.source_path.as_deref(), Some(source.as_path()));
        assert_eq!(fetched.size_bytes, 256);
        assert_eq!(fetched.expires_at - fetched.created_at, chrono::Duration::hours(1));
        assert_eq!(store.len().await, 1);
        store.stop();
    }

    #[tokio::test]
    async fn test_store_missing_artifact_fails() {
        let tmp = TempDir::new().unwrap();
        let store = EphemeralStore::open_with_timing(tmp.path(), HOUR, HOUR)
            .await
            .unwrap();

        let result = store
            .store(&tmp.path().join("nope.mp4"), None, MediaFormat::Mp4)
            .await;
        assert!(matches!(result, Err(StoreError::ArtifactMissing { .. })));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_open_rejects_unschedulable_timing() {
        let tmp = TempDir::new().unwrap();

        let zero_sweep = EphemeralStore::open_with_timing(tmp.path(), HOUR, Duration::ZERO).await;
        assert!(matches!(zero_sweep, Err(StoreError::InvalidTiming { .. })));

        let zero_ttl = EphemeralStore::open_with_timing(tmp.path(), Duration::ZERO, HOUR).await;
        assert!(matches!(zero_ttl, Err(StoreError::InvalidTiming { .. })));

        let huge = EphemeralStore::open_with_timing(tmp.path(), Duration::MAX, HOUR).await;
        assert!(matches!(huge, Err(StoreError::InvalidTiming { .. })));
    }

    #[tokio::test]
    async fn test_expired_entry_is_hidden_before_deletion() {
        let tmp = TempDir::new().unwrap();
        let ttl = Duration::from_millis(100);
        let store = EphemeralStore::open_with_timing(tmp.path(), ttl, HOUR)
            .await
            .unwrap();
        let artifact = write_file(tmp.path(), "pending.wav");

        // No timer and a sweep an hour away: nothing deletes the files yet.
        let stored = store
            .insert(&artifact, None, MediaFormat::Wav, false)
            .await
            .unwrap();
        assert!(store.get(&stored.id).await.is_some());

        tokio::time::sleep(ttl + Duration::from_millis(100)).await;

        assert!(store.get(&stored.id).await.is_none());
        assert!(store.is_empty().await);
        assert_eq!(store.stats().await.entries, 0);
        assert!(artifact.exists());
        assert!(store.shared.entries.read().await.contains_key(&stored.id));
        store.stop();
    }

    #[tokio::test]
    async fn test_timer_evicts_after_ttl() {
        let tmp = TempDir::new().unwrap();
        let ttl = Duration::from_millis(150);
        let store = EphemeralStore::open_with_timing(tmp.path(), ttl, HOUR)
            .await
            .unwrap();
        let artifact = write_file(tmp.path(), "a.png");
        let source = write_file(tmp.path(), "a.original.png");

        let stored = store
            .store(&artifact, Some(&source), MediaFormat::Png)
            .await
            .unwrap();
        tokio::time::sleep(ttl + Duration::from_millis(200)).await;

        assert!(store.get(&stored.id).await.is_none());
        assert!(!artifact.exists());
        assert!(!source.exists());

        let stats = store.stats().await;
        assert_eq!(stats.timer_evictions, 1);
        assert_eq!(stats.sweep_evictions, 0);
    }

    #[tokio::test]
    async fn test_ttl_is_never_renewed_by_reads() {
        let tmp = TempDir::new().unwrap();
        let ttl = Duration::from_millis(300);
        let store = EphemeralStore::open_with_timing(tmp.path(), ttl, HOUR)
            .await
            .unwrap();
        let artifact = write_file(tmp.path(), "v.mp4");
        let stored = store.store(&artifact, None, MediaFormat::Mp4).await.unwrap();
        let start = std::time::Instant::now();

        let mut last_seen = None;
        while start.elapsed() < ttl + Duration::from_millis(100) {
            if store.get(&stored.id).await.is_some() {
                last_seen = Some(start.elapsed());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let last_seen = last_seen.expect("object should be visible before expiry");
        assert!(last_seen < ttl, "seen at {:?} past ttl {:?}", last_seen, ttl);
        assert!(store.get(&stored.id).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_catches_entry_without_timer() {
        let tmp = TempDir::new().unwrap();
        let store = EphemeralStore::open_with_timing(
            tmp.path(),
            Duration::from_millis(100),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        let artifact = write_file(tmp.path(), "leak.wav");

        let stored = store
            .insert(&artifact, None, MediaFormat::Wav, false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(!artifact.exists());
        assert!(store.shared.entries.read().await.get(&stored.id).is_none());
        let stats = store.stats().await;
        assert_eq!(stats.sweep_evictions, 1);
        assert_eq!(stats.timer_evictions, 0);
    }

    #[tokio::test]
    async fn test_eviction_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = EphemeralStore::open_with_timing(tmp.path(), Duration::from_millis(100), HOUR)
            .await
            .unwrap();
        let doomed = write_file(tmp.path(), "doomed.ogg");
        let stored = store.store(&doomed, None, MediaFormat::Ogg).await.unwrap();

        // Files already gone before either path runs.
        std::fs::remove_file(&doomed).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!store.shared.evict(&stored.id, EvictionPath::Timer).await);
        assert_eq!(store.shared.sweep().await, 0);
        assert_eq!(store.stats().await.timer_evictions, 1);
    }

    #[tokio::test]
    async fn test_eviction_does_not_touch_live_entries() {
        let tmp = TempDir::new().unwrap();
        let store = EphemeralStore::open_with_timing(tmp.path(), HOUR, HOUR)
            .await
            .unwrap();
        let live = write_file(tmp.path(), "live.jpg");
        let stored = store.store(&live, None, MediaFormat::Jpeg).await.unwrap();

        assert_eq!(store.shared.sweep().await, 0);
        assert!(!store.shared.evict("0123456789abcdef0123456789abcdef", EvictionPath::Sweep).await);
        assert!(store.get(&stored.id).await.is_some());
        assert!(live.exists());
    }

    #[tokio::test]
    async fn test_stop_keeps_scheduled_deletions() {
        let tmp = TempDir::new().unwrap();
        let store = EphemeralStore::open_with_timing(tmp.path(), Duration::from_millis(100), HOUR)
            .await
            .unwrap();
        let artifact = write_file(tmp.path(), "late.m4a");
        store.store(&artifact, None, MediaFormat::M4a).await.unwrap();

        store.stop();
        store.stop();
        assert!(artifact.exists());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!artifact.exists());
    }
}
