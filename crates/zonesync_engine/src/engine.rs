//! The sync engine facade.

use crate::cache::{CachedRecord, RecordCache};
use crate::classifier::{ErrorClassifier, RetryStrategy};
use crate::config::EngineConfig;
use crate::cursor_store::CursorStore;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, RecordsChanged};
use crate::orchestrator::SyncReport;
use crate::remote::RemoteStore;
use crate::snapshot::EngineSnapshot;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use zonesync_protocol::{DatabaseScope, Record, RecordDraft, RecordId, RemoteError, ZoneId};

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Database syncs that completed.
    pub syncs_completed: u64,
    /// Database syncs that failed.
    pub syncs_failed: u64,
    /// Records inserted or replaced in the cache by syncs and writes.
    pub records_upserted: u64,
    /// Records removed from the cache by syncs and writes.
    pub records_deleted: u64,
    /// Zones purged from the cache.
    pub zones_purged: u64,
    /// Automatic sync retries.
    pub retries: u64,
    /// Last completed sync.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Keeps a local record cache consistent with a remote record store.
///
/// The engine is an explicitly constructed service: hosts create one per
/// account and share it (it is `Send + Sync`). Reads are served from the
/// cache; writes go to the remote store first and touch the cache only
/// with what the server confirmed.
///
/// Lock order is always cache, then cursors, then the known zone. No lock is
/// held across a remote round trip.
pub struct SyncEngine {
    pub(crate) config: EngineConfig,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) classifier: ErrorClassifier,
    pub(crate) cache: RwLock<RecordCache>,
    pub(crate) cursors: Mutex<CursorStore>,
    pub(crate) known_zone: RwLock<Option<ZoneId>>,
    pub(crate) events: EventBus,
    pub(crate) stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl SyncEngine {
    /// Creates an engine over the given remote store.
    pub fn new(config: EngineConfig, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            classifier: ErrorClassifier::new(config.classifier),
            events: EventBus::new(config.event_capacity),
            config,
            remote,
            cache: RwLock::new(RecordCache::new()),
            cursors: Mutex::new(CursorStore::new()),
            known_zone: RwLock::new(None),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the error classifier.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Subscribes to change notifications and makes sure the well-known zone
    /// exists in the private database.
    ///
    /// Subscription failures are logged and otherwise ignored. Once the zone
    /// is confirmed, records can be created in the private database.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SyncResult<()> {
        for &database in &self.config.databases {
            if let Err(error) = self.remote.subscribe_to_database(database).await {
                let strategy = self.classifier.classify(&error);
                warn!(%database, %error, %strategy, "subscription failed");
            }
        }

        let zone = self.well_known_zone_id();
        self.remote
            .create_zone(DatabaseScope::Private, &zone)
            .await
            .map_err(|error| self.write_failure(DatabaseScope::Private, error))?;

        info!(%zone, "well-known zone ready");
        *self.known_zone.write() = Some(zone);
        Ok(())
    }

    /// Syncs every configured database concurrently.
    ///
    /// All databases run to completion; changes applied by any of them stay
    /// applied. Returns the first failure, if any.
    pub async fn fetch_all_updates(&self) -> SyncResult<Vec<SyncReport>> {
        self.reset_cancel();
        let results = join_all(
            self.config
                .databases
                .iter()
                .map(|&database| self.sync_database(database)),
        )
        .await;
        results.into_iter().collect()
    }

    /// Like [`fetch_all_updates`](Self::fetch_all_updates), re-running each
    /// failed database while its failure is automatically retryable.
    pub async fn fetch_all_updates_with_retry(&self) -> SyncResult<Vec<SyncReport>> {
        self.reset_cancel();
        let results = join_all(
            self.config
                .databases
                .iter()
                .map(|&database| self.sync_with_retry(database)),
        )
        .await;
        results.into_iter().collect()
    }

    /// Syncs one database.
    pub async fn fetch_updates(&self, database: DatabaseScope) -> SyncResult<SyncReport> {
        self.reset_cancel();
        self.sync_database(database).await
    }

    /// Saves a record. On success the cache holds the server's version,
    /// which is returned.
    pub async fn save(&self, database: DatabaseScope, record: Record) -> SyncResult<Record> {
        self.save_record(database, record).await
    }

    /// Deletes a record.
    pub async fn delete(&self, database: DatabaseScope, id: &RecordId) -> SyncResult<()> {
        self.delete_record(database, id).await
    }

    /// Creates a new record from a validated draft.
    ///
    /// With a parent, the record lands in the parent's zone and is deleted
    /// along with it.
    pub async fn create_record(
        &self,
        database: DatabaseScope,
        draft: impl Into<RecordDraft>,
        parent: Option<&RecordId>,
    ) -> SyncResult<Record> {
        self.create(database, draft.into(), parent).await
    }

    /// Returns the share of a record, creating it if needed.
    pub async fn share_for(&self, database: DatabaseScope, record: &Record) -> SyncResult<Record> {
        self.share_record(database, record).await
    }

    /// Deletes a share.
    pub async fn stop_sharing(&self, database: DatabaseScope, share: &RecordId) -> SyncResult<()> {
        self.delete_record(database, share).await
    }

    /// Every cached list.
    pub fn lists_view(&self) -> Vec<CachedRecord> {
        self.cache.read().lists()
    }

    /// Every cached todo.
    pub fn todos_view(&self) -> Vec<CachedRecord> {
        self.cache.read().todos()
    }

    /// Every cached share.
    pub fn shares_view(&self) -> Vec<CachedRecord> {
        self.cache.read().shares()
    }

    /// Returns a cached record.
    pub fn get(&self, database: DatabaseScope, id: &RecordId) -> Option<Record> {
        self.cache.read().get(database, id).cloned()
    }

    /// Number of cached records.
    pub fn cached_records(&self) -> usize {
        self.cache.read().len()
    }

    /// The zone new private records are created in, once known.
    pub fn known_zone(&self) -> Option<ZoneId> {
        self.known_zone.read().clone()
    }

    /// Subscribes to [`RecordsChanged`] events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordsChanged> {
        self.events.subscribe()
    }

    /// Cancels in-flight syncs. Zone data fetched but not yet applied is
    /// discarded; the next fetch clears the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Captures the cache, cursors and known zone.
    pub fn snapshot(&self) -> EngineSnapshot {
        let cache = self.cache.read();
        let cursors = self.cursors.lock();
        let known_zone = self.known_zone.read();
        EngineSnapshot::new(cache.entries(), cursors.snapshot(), known_zone.clone())
    }

    /// Replaces the cache, cursors and known zone with a snapshot.
    pub fn restore(&self, snapshot: EngineSnapshot) {
        let mut cache = self.cache.write();
        let mut cursors = self.cursors.lock();
        let mut known_zone = self.known_zone.write();

        let mut restored = RecordCache::new();
        for entry in snapshot.records {
            restored.upsert(entry.database, entry.record);
        }
        *cache = restored;
        *cursors = CursorStore::restore(snapshot.cursors);
        *known_zone = snapshot.well_known_zone;
        info!(records = cache.len(), "restored snapshot");
    }

    pub(crate) fn well_known_zone_id(&self) -> ZoneId {
        ZoneId::owned(self.config.well_known_zone.clone())
    }

    fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub(crate) fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Classifies a failed read. An expired cursor drops every cursor so the
    /// next sync starts over.
    pub(crate) fn read_failure(&self, database: DatabaseScope, error: RemoteError) -> SyncError {
        let strategy = self.classifier.classify(&error);
        if strategy == RetryStrategy::InvalidateCursorsAndRefetchAll {
            self.cursors.lock().invalidate_all();
        }
        warn!(%database, %error, %strategy, "fetch failed");
        SyncError::Remote {
            database,
            error,
            strategy,
        }
    }

    /// Classifies a failed write.
    pub(crate) fn write_failure(&self, database: DatabaseScope, error: RemoteError) -> SyncError {
        let strategy = self.classifier.classify(&error);
        warn!(%database, %error, %strategy, "write failed");
        SyncError::Remote {
            database,
            error,
            strategy,
        }
    }

    /// Emits a write's change set and counts it.
    pub(crate) fn publish(&self, change: RecordsChanged) {
        {
            let mut stats = self.stats.write();
            stats.records_upserted += change.upserted.len() as u64;
            stats.records_deleted += change.deleted.len() as u64;
        }
        self.events.emit(change);
    }
}
