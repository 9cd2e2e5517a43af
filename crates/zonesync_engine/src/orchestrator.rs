//! Two-phase delta sync.
//!
//! A database sync first pages through database-level changes to learn which
//! zones changed, then fetches the record deltas of those zones in one
//! combined request. Each zone outcome is applied to the cache together with
//! its cursor, so zones complete independently and no cursor is ever stored
//! ahead of the records it covers.
//!
//! Zones learned in the first phase are kept pending in the cursor store
//! until their records are drained, so a failed or cancelled second phase is
//! resumed by the next sync even though the database cursor already moved.

use crate::classifier::RetryStrategy;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::events::RecordsChanged;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use zonesync_protocol::{
    ChangeCursor, DatabaseScope, ItemKey, RecordId, RemoteError, ZoneChange, ZoneChangeKind,
    ZoneFetchRequest, ZoneId,
};

/// Result of syncing one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// The synced database.
    pub database: DatabaseScope,
    /// Zones reported as changed by the database-level fetch.
    pub changed_zones: usize,
    /// Zones whose records were purged.
    pub purged_zones: Vec<ZoneId>,
    /// Records inserted or replaced.
    pub upserted: usize,
    /// Records removed.
    pub deleted: usize,
    /// Combined zone fetches issued.
    pub zone_fetches: usize,
    /// Wall time of the sync.
    pub duration: Duration,
}

impl SyncReport {
    fn new(database: DatabaseScope) -> Self {
        Self {
            database,
            changed_zones: 0,
            purged_zones: Vec::new(),
            upserted: 0,
            deleted: 0,
            zone_fetches: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the sync changed nothing.
    pub fn is_empty(&self) -> bool {
        self.purged_zones.is_empty() && self.upserted == 0 && self.deleted == 0
    }
}

/// Ids seen so far by full zone fetches, used to drop cached records the
/// server no longer has.
type Sweeps = HashMap<ZoneId, HashSet<RecordId>>;

impl SyncEngine {
    /// Syncs one database. Changes applied before a failure stay applied and
    /// are notified.
    #[instrument(skip(self))]
    pub(crate) async fn sync_database(&self, database: DatabaseScope) -> SyncResult<SyncReport> {
        let start = Instant::now();
        let mut report = SyncReport::new(database);
        let mut change = RecordsChanged::new(database);

        let result = self.run_phases(database, &mut report, &mut change).await;

        report.purged_zones = change.purged_zones.clone();
        report.upserted = change.upserted.len();
        report.deleted = change.deleted.len();
        report.duration = start.elapsed();

        {
            let mut stats = self.stats.write();
            stats.records_upserted += report.upserted as u64;
            stats.records_deleted += report.deleted as u64;
            stats.zones_purged += report.purged_zones.len() as u64;
            match &result {
                Ok(()) => {
                    stats.syncs_completed += 1;
                    stats.last_sync_time = Some(Instant::now());
                }
                Err(e) => {
                    stats.syncs_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
            }
        }
        self.events.emit(change);

        result?;
        info!(
            changed_zones = report.changed_zones,
            upserted = report.upserted,
            deleted = report.deleted,
            purged = report.purged_zones.len(),
            "sync complete"
        );
        Ok(report)
    }

    /// Syncs one database, retrying while the failure is automatically
    /// retryable. Waits at least as long as the server asked.
    pub(crate) async fn sync_with_retry(&self, database: DatabaseScope) -> SyncResult<SyncReport> {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let error = match self.sync_database(database).await {
                Ok(report) => return Ok(report),
                Err(e) => e,
            };

            attempt += 1;
            if !error.is_retryable() || attempt >= retry.max_attempts {
                return Err(error);
            }

            let backoff = retry.delay_for_attempt(attempt);
            let delay = error
                .strategy()
                .and_then(RetryStrategy::retry_delay)
                .map_or(backoff, |suggested| suggested.max(backoff));

            self.stats.write().retries += 1;
            info!(%database, attempt, ?delay, %error, "retrying sync");
            tokio::time::sleep(delay).await;
            self.check_cancelled()?;
        }
    }

    async fn run_phases(
        &self,
        database: DatabaseScope,
        report: &mut SyncReport,
        change: &mut RecordsChanged,
    ) -> SyncResult<()> {
        self.discover_zones(database, report, change).await?;
        self.fetch_zone_deltas(database, report, change).await
    }

    /// Phase one: page through database-level changes.
    async fn discover_zones(
        &self,
        database: DatabaseScope,
        report: &mut SyncReport,
        change: &mut RecordsChanged,
    ) -> SyncResult<()> {
        let well_known = self.well_known_zone_id();

        loop {
            self.check_cancelled()?;
            let cursor = self.cursors.lock().database_cursor(database);
            let page = self
                .remote
                .fetch_database_changes(database, cursor.as_ref())
                .await
                .map_err(|e| self.read_failure(database, e))?;
            self.check_cancelled()?;

            debug!(
                zones = page.zones.len(),
                more_coming = page.more_coming,
                "database changes page"
            );

            let more_coming = page.more_coming;
            {
                let mut cache = self.cache.write();
                let mut cursors = self.cursors.lock();
                for (zone, kind) in page.zones {
                    match kind {
                        ZoneChangeKind::Changed => {
                            if database == DatabaseScope::Private && zone == well_known {
                                *self.known_zone.write() = Some(zone.clone());
                            }
                            report.changed_zones += 1;
                            cursors.mark_pending(database, zone);
                        }
                        ZoneChangeKind::Purged | ZoneChangeKind::Deleted => {
                            cursors.invalidate_zone(database, &zone);
                            let purged = cache.purge_zone(database, &zone);
                            debug!(%zone, ?kind, records = purged.len(), "zone invalidated");

                            if kind == ZoneChangeKind::Deleted && database == DatabaseScope::Private {
                                let mut known = self.known_zone.write();
                                if known.as_ref() == Some(&zone) {
                                    *known = None;
                                }
                            }
                            if !change.purged_zones.contains(&zone) {
                                change.purged_zones.push(zone);
                            }
                        }
                    }
                }
                cursors.set_database_cursor(database, page.cursor);
            }

            if !more_coming {
                return Ok(());
            }
        }
    }

    /// Phase two: fetch the record deltas of every pending zone.
    async fn fetch_zone_deltas(
        &self,
        database: DatabaseScope,
        report: &mut SyncReport,
        change: &mut RecordsChanged,
    ) -> SyncResult<()> {
        let mut requests: Vec<ZoneFetchRequest> = {
            let cursors = self.cursors.lock();
            cursors
                .pending_zones(database)
                .into_iter()
                .map(|zone| ZoneFetchRequest {
                    cursor: cursors.zone_cursor(database, &zone),
                    zone,
                })
                .collect()
        };
        if requests.is_empty() {
            debug!("no zones changed");
            return Ok(());
        }

        let mut sweeps: Sweeps = requests
            .iter()
            .filter(|r| r.cursor.is_none())
            .map(|r| (r.zone.clone(), HashSet::new()))
            .collect();
        let mut failures: Vec<(ItemKey, RemoteError)> = Vec::new();
        let mut expired = false;

        while !requests.is_empty() {
            self.check_cancelled()?;
            report.zone_fetches += 1;
            let outcomes = self
                .remote
                .fetch_zone_changes(database, &requests)
                .await
                .map_err(|e| self.read_failure(database, e))?;

            let mut next = Vec::new();
            for outcome in outcomes {
                self.check_cancelled()?;

                if let Some(error) = outcome.error {
                    let strategy = self.classifier.classify(&error);
                    warn!(zone = %outcome.zone, %error, %strategy, "zone fetch failed");
                    expired |= strategy == RetryStrategy::InvalidateCursorsAndRefetchAll;
                    sweeps.remove(&outcome.zone);
                    failures.push((ItemKey::Zone(outcome.zone), error));
                    continue;
                }

                let Some(cursor) = outcome.cursor else {
                    return Err(SyncError::Protocol(format!(
                        "zone {} completed without a cursor",
                        outcome.zone
                    )));
                };

                debug!(
                    zone = %outcome.zone,
                    changes = outcome.changes.len(),
                    more_coming = outcome.more_coming,
                    "zone changes"
                );
                self.apply_zone(
                    database,
                    &outcome.zone,
                    outcome.changes,
                    cursor.clone(),
                    outcome.more_coming,
                    &mut sweeps,
                    change,
                );

                if outcome.more_coming {
                    next.push(ZoneFetchRequest {
                        zone: outcome.zone,
                        cursor: Some(cursor),
                    });
                }
            }
            requests = if expired { Vec::new() } else { next };
        }

        if expired {
            info!("zone change token expired, dropping every cursor");
            self.cursors.lock().invalidate_all();
        }
        let error = match failures.len() {
            0 => return Ok(()),
            1 => failures.remove(0).1,
            _ => RemoteError::partial(failures),
        };
        let strategy = self.classifier.classify(&error);
        Err(SyncError::Remote {
            database,
            error,
            strategy,
        })
    }

    /// Applies one zone outcome and its cursor in a single critical section.
    #[allow(clippy::too_many_arguments)]
    fn apply_zone(
        &self,
        database: DatabaseScope,
        zone: &ZoneId,
        changes: Vec<ZoneChange>,
        cursor: ChangeCursor,
        more_coming: bool,
        sweeps: &mut Sweeps,
        change: &mut RecordsChanged,
    ) {
        let full_fetch = sweeps.contains_key(zone);
        let mut cache = self.cache.write();
        let mut cursors = self.cursors.lock();

        for zone_change in changes {
            match zone_change {
                ZoneChange::RecordChanged(record) => {
                    if let Some(seen) = sweeps.get_mut(zone) {
                        seen.insert(record.id.clone());
                    }
                    change.upserted.push(record.id.clone());
                    cache.upsert(database, record);
                }
                ZoneChange::RecordDeleted { id, .. } => {
                    if cache.remove(database, &id).is_some() {
                        change.deleted.push(id);
                    }
                }
            }
        }

        if !more_coming {
            if let Some(seen) = sweeps.remove(zone) {
                for id in cache.ids_in_zone(database, zone) {
                    if !seen.contains(&id) {
                        cache.remove(database, &id);
                        change.deleted.push(id);
                    }
                }
            }
            cursors.clear_pending(database, zone);
        }
        // A full fetch keeps its cursor local until the last page, so an
        // interrupted one starts over from nothing and still sweeps.
        if !more_coming || !full_fetch {
            cursors.set_zone_cursor(database, zone.clone(), cursor);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{EngineConfig, RetryConfig};
    use crate::engine::SyncEngine;
    use crate::error::SyncError;
    use crate::remote::{MockCall, MockRemote};
    use crate::RetryStrategy;
    use std::sync::Arc;
    use std::time::Duration;
    use zonesync_protocol::{
        ChangeCursor, DatabaseChangesPage, DatabaseScope, Record, RecordId, RecordType,
        RemoteError, RemoteErrorCode, ZoneChange, ZoneChangeKind, ZoneFetchOutcome, ZoneId,
    };

    fn cursor(tag: &str) -> ChangeCursor {
        ChangeCursor::from_bytes(tag.as_bytes().to_vec())
    }

    fn zone() -> ZoneId {
        ZoneId::owned("todos")
    }

    fn list(name: &str) -> Record {
        Record::new(RecordId::new(zone(), name), RecordType::List)
    }

    fn page(zones: Vec<(ZoneId, ZoneChangeKind)>, tag: &str, more: bool) -> DatabaseChangesPage {
        DatabaseChangesPage {
            zones,
            cursor: cursor(tag),
            more_coming: more,
        }
    }

    fn private_engine(mock: &Arc<MockRemote>) -> SyncEngine {
        let config = EngineConfig::default().with_databases([DatabaseScope::Private]);
        SyncEngine::new(config, mock.clone())
    }

    #[tokio::test]
    async fn no_changed_zones_skips_zone_fetch() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        let mut rx = engine.subscribe();

        let report = engine.fetch_updates(DatabaseScope::Private).await.unwrap();
        assert_eq!(report.changed_zones, 0);
        assert_eq!(report.zone_fetches, 0);
        assert_eq!(mock.zone_fetch_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pages_and_zone_continuations_are_drained() {
        let mock = Arc::new(MockRemote::new());
        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Changed)], "db1", true)),
        );
        mock.push_database_page(DatabaseScope::Private, Ok(page(vec![], "db2", false)));
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![ZoneChange::RecordChanged(list("a"))],
            cursor("z1"),
            true,
        )]));
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![ZoneChange::RecordChanged(list("b"))],
            cursor("z2"),
            false,
        )]));

        let engine = private_engine(&mock);
        let mut rx = engine.subscribe();
        let report = engine.fetch_updates(DatabaseScope::Private).await.unwrap();

        assert_eq!(report.upserted, 2);
        assert_eq!(report.zone_fetches, 2);
        assert_eq!(engine.lists_view().len(), 2);

        let cursors = engine.cursors.lock();
        assert_eq!(
            cursors.database_cursor(DatabaseScope::Private),
            Some(cursor("db2"))
        );
        assert_eq!(
            cursors.zone_cursor(DatabaseScope::Private, &zone()),
            Some(cursor("z2"))
        );
        assert!(cursors.pending_zones(DatabaseScope::Private).is_empty());
        drop(cursors);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.upserted.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn continuation_requests_carry_new_cursor() {
        let mock = Arc::new(MockRemote::new());
        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Changed)], "db1", false)),
        );
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![],
            cursor("z1"),
            true,
        )]));

        let engine = private_engine(&mock);
        engine.fetch_updates(DatabaseScope::Private).await.unwrap();

        let requests: Vec<_> = mock
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::ZoneChanges(_, requests) => Some(requests),
                _ => None,
            })
            .collect();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0][0].cursor, None);
        assert_eq!(requests[1][0].cursor, Some(cursor("z1")));
    }

    #[tokio::test]
    async fn purged_zone_drops_records_and_notifies() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        engine.cache.write().upsert(DatabaseScope::Private, list("a"));
        engine
            .cursors
            .lock()
            .set_zone_cursor(DatabaseScope::Private, zone(), cursor("z"));
        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Purged)], "db1", false)),
        );

        let mut rx = engine.subscribe();
        let report = engine.fetch_updates(DatabaseScope::Private).await.unwrap();

        assert_eq!(report.purged_zones, vec![zone()]);
        assert_eq!(engine.cached_records(), 0);
        assert!(engine
            .cursors
            .lock()
            .zone_cursor(DatabaseScope::Private, &zone())
            .is_none());
        assert_eq!(rx.try_recv().unwrap().purged_zones, vec![zone()]);
    }

    #[tokio::test]
    async fn deleted_well_known_zone_is_forgotten() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        engine.start().await.unwrap();
        assert!(engine.known_zone().is_some());

        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Deleted)], "db1", false)),
        );
        engine.fetch_updates(DatabaseScope::Private).await.unwrap();
        assert!(engine.known_zone().is_none());

        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Changed)], "db2", false)),
        );
        engine.fetch_updates(DatabaseScope::Private).await.unwrap();
        assert_eq!(engine.known_zone(), Some(zone()));
    }

    #[tokio::test]
    async fn failed_zone_stays_pending_and_is_resumed() {
        let mock = Arc::new(MockRemote::new());
        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Changed)], "db1", false)),
        );
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::failed(
            zone(),
            RemoteError::new(RemoteErrorCode::ZoneBusy, "busy")
                .with_retry_after(Duration::from_secs(5)),
        )]));

        let engine = private_engine(&mock);
        let err = engine
            .fetch_updates(DatabaseScope::Private)
            .await
            .unwrap_err();
        assert_eq!(
            err.strategy(),
            Some(&RetryStrategy::RetryAfter(Some(Duration::from_secs(5))))
        );
        assert_eq!(
            engine.cursors.lock().pending_zones(DatabaseScope::Private),
            vec![zone()]
        );

        // The database cursor moved on, but the zone is fetched again.
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![ZoneChange::RecordChanged(list("a"))],
            cursor("z1"),
            false,
        )]));
        engine.fetch_updates(DatabaseScope::Private).await.unwrap();
        assert_eq!(engine.lists_view().len(), 1);
        assert_eq!(engine.stats().syncs_failed, 1);
        assert_eq!(engine.stats().syncs_completed, 1);
    }

    #[tokio::test]
    async fn expired_zone_cursor_invalidates_everything() {
        let mock = Arc::new(MockRemote::new());
        let work = ZoneId::owned("work");
        let engine = private_engine(&mock);
        {
            let mut cursors = engine.cursors.lock();
            cursors.set_zone_cursor(DatabaseScope::Private, zone(), cursor("t0"));
            cursors.set_zone_cursor(DatabaseScope::Private, work.clone(), cursor("w0"));
        }
        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(
                vec![
                    (zone(), ZoneChangeKind::Changed),
                    (work.clone(), ZoneChangeKind::Changed),
                ],
                "db1",
                false,
            )),
        );
        mock.push_zone_response(Ok(vec![
            ZoneFetchOutcome::failed(
                zone(),
                RemoteError::new(RemoteErrorCode::ChangeTokenExpired, "expired"),
            ),
            ZoneFetchOutcome::completed(work.clone(), Vec::new(), cursor("w1"), false),
        ]));

        let err = engine
            .fetch_updates(DatabaseScope::Private)
            .await
            .unwrap_err();
        assert_eq!(
            err.strategy(),
            Some(&RetryStrategy::InvalidateCursorsAndRefetchAll)
        );

        let cursors = engine.cursors.lock();
        assert!(cursors.database_cursor(DatabaseScope::Private).is_none());
        assert!(cursors.zone_cursor(DatabaseScope::Private, &zone()).is_none());
        assert!(cursors.zone_cursor(DatabaseScope::Private, &work).is_none());
        assert!(cursors.pending_zones(DatabaseScope::Private).is_empty());
    }

    #[tokio::test]
    async fn expired_database_cursor_invalidates_everything() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        {
            let mut cursors = engine.cursors.lock();
            cursors.set_database_cursor(DatabaseScope::Private, cursor("old"));
            cursors.set_zone_cursor(DatabaseScope::Private, zone(), cursor("z"));
        }
        mock.push_database_page(
            DatabaseScope::Private,
            Err(RemoteError::new(RemoteErrorCode::ChangeTokenExpired, "expired")),
        );

        let err = engine
            .fetch_updates(DatabaseScope::Private)
            .await
            .unwrap_err();
        assert_eq!(
            err.strategy(),
            Some(&RetryStrategy::InvalidateCursorsAndRefetchAll)
        );
        let cursors = engine.cursors.lock();
        assert!(cursors.database_cursor(DatabaseScope::Private).is_none());
        assert!(cursors.zone_cursor(DatabaseScope::Private, &zone()).is_none());
    }

    #[tokio::test]
    async fn full_zone_fetch_sweeps_stale_records() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        engine.cache.write().upsert(DatabaseScope::Private, list("stale"));

        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Changed)], "db1", false)),
        );
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![ZoneChange::RecordChanged(list("fresh"))],
            cursor("z1"),
            false,
        )]));

        let report = engine.fetch_updates(DatabaseScope::Private).await.unwrap();
        assert_eq!(report.upserted, 1);
        assert_eq!(report.deleted, 1);
        assert!(engine
            .get(DatabaseScope::Private, &list("stale").id)
            .is_none());
        assert!(engine
            .get(DatabaseScope::Private, &list("fresh").id)
            .is_some());
    }

    #[tokio::test]
    async fn interrupted_full_fetch_restarts_and_sweeps() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        engine.cache.write().upsert(DatabaseScope::Private, list("stale"));

        mock.push_database_page(
            DatabaseScope::Private,
            Ok(page(vec![(zone(), ZoneChangeKind::Changed)], "db1", false)),
        );
        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![ZoneChange::RecordChanged(list("fresh"))],
            cursor("z1"),
            true,
        )]));
        mock.push_zone_response(Err(RemoteError::new(
            RemoteErrorCode::NetworkFailure,
            "reset",
        )));

        engine
            .fetch_updates(DatabaseScope::Private)
            .await
            .unwrap_err();
        assert!(engine
            .get(DatabaseScope::Private, &list("stale").id)
            .is_some());
        {
            let cursors = engine.cursors.lock();
            assert!(cursors.zone_cursor(DatabaseScope::Private, &zone()).is_none());
            assert_eq!(cursors.pending_zones(DatabaseScope::Private), vec![zone()]);
        }

        // The state survives a snapshot round trip before the next sync.
        let restored = private_engine(&mock);
        restored.restore(engine.snapshot());

        mock.push_zone_response(Ok(vec![ZoneFetchOutcome::completed(
            zone(),
            vec![ZoneChange::RecordChanged(list("fresh"))],
            cursor("z2"),
            false,
        )]));
        let report = restored
            .fetch_updates(DatabaseScope::Private)
            .await
            .unwrap();
        assert_eq!(report.deleted, 1);
        assert!(restored
            .get(DatabaseScope::Private, &list("stale").id)
            .is_none());
        assert!(restored
            .get(DatabaseScope::Private, &list("fresh").id)
            .is_some());
        assert_eq!(
            restored
                .cursors
                .lock()
                .zone_cursor(DatabaseScope::Private, &zone()),
            Some(cursor("z2"))
        );

        let last = mock
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::ZoneChanges(_, requests) => Some(requests),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last[0].cursor, None);
    }

    #[tokio::test]
    async fn cancelled_sync_applies_nothing() {
        let mock = Arc::new(MockRemote::new());
        let engine = private_engine(&mock);
        engine.cancel();

        // A cancel before the fetch is cleared by the fetch itself.
        engine.fetch_updates(DatabaseScope::Private).await.unwrap();

        engine.cancel();
        let err = engine.sync_database(DatabaseScope::Private).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert!(engine
            .cursors
            .lock()
            .database_cursor(DatabaseScope::Private)
            .is_some());
    }

    #[tokio::test]
    async fn retry_waits_and_recovers() {
        let mock = Arc::new(MockRemote::new());
        mock.push_database_page(
            DatabaseScope::Private,
            Err(RemoteError::new(RemoteErrorCode::NetworkFailure, "reset")),
        );
        let config = EngineConfig::default()
            .with_databases([DatabaseScope::Private])
            .with_retry(
                RetryConfig::new(3)
                    .with_initial_delay(Duration::from_millis(1))
                    .with_jitter(false),
            );
        let engine = SyncEngine::new(config, mock.clone());

        let reports = engine.fetch_all_updates_with_retry().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(engine.stats().retries, 1);
    }

    #[tokio::test]
    async fn non_automatic_failures_are_not_retried() {
        let mock = Arc::new(MockRemote::new());
        mock.push_database_page(
            DatabaseScope::Private,
            Err(RemoteError::new(RemoteErrorCode::NotAuthenticated, "signed out")),
        );
        let engine = private_engine(&mock);

        let err = engine.fetch_all_updates_with_retry().await.unwrap_err();
        assert_eq!(err.strategy(), Some(&RetryStrategy::PromptUser));
        assert_eq!(engine.stats().retries, 0);
    }
}
