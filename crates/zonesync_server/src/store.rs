//! The in-memory remote store.

use crate::config::StoreConfig;
use crate::cursor::{DatabasePosition, ZonePosition};
use crate::database::DatabaseState;
use crate::error::{StoreError, StoreResult};
use crate::zone::ZoneState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;
use zonesync_engine::RemoteStore;
use zonesync_protocol::{
    ChangeCursor, ChangeTag, DatabaseChangesPage, DatabaseScope, FieldValue, ItemKey,
    ModifyOutcome, Record, RecordId, ReferenceAction, RemoteError, RemoteErrorCode,
    RemoteResult, ZoneChange, ZoneChangeKind, ZoneFetchOutcome, ZoneFetchRequest, ZoneId,
    SHARE_ROOT_FIELD,
};

/// A remote operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// `fetch_database_changes`.
    DatabaseChanges,
    /// `fetch_zone_changes`, failing the whole request.
    ZoneChanges,
    /// `modify_records`.
    Modify,
    /// `create_zone`.
    CreateZone,
    /// `subscribe_to_database`.
    Subscribe,
}

struct StoreState {
    databases: HashMap<DatabaseScope, DatabaseState>,
    next_tag: u64,
    next_generation: u64,
    faults: HashMap<FaultPoint, VecDeque<RemoteError>>,
    zone_faults: HashMap<(DatabaseScope, ZoneId), VecDeque<RemoteError>>,
    requests: HashMap<FaultPoint, usize>,
}

impl StoreState {
    fn new() -> Self {
        let mut state = Self {
            databases: HashMap::new(),
            next_tag: 1,
            next_generation: 1,
            faults: HashMap::new(),
            zone_faults: HashMap::new(),
            requests: HashMap::new(),
        };
        for database in DatabaseScope::ALL {
            let generation = state.allocate_generation();
            state
                .databases
                .insert(database, DatabaseState::new(generation));
        }
        state
    }

    fn allocate_tag(&mut self) -> ChangeTag {
        let tag = ChangeTag::new(format!("ct-{}", self.next_tag));
        self.next_tag += 1;
        tag
    }

    fn allocate_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    fn database(&mut self, database: DatabaseScope) -> &mut DatabaseState {
        let generation = self.next_generation;
        self.databases
            .entry(database)
            .or_insert_with(|| DatabaseState::new(generation))
    }

    /// Counts the request and returns the injected fault, if any.
    fn begin(&mut self, point: FaultPoint) -> RemoteResult<()> {
        *self.requests.entry(point).or_default() += 1;
        match self.faults.get_mut(&point).and_then(VecDeque::pop_front) {
            Some(error) => {
                debug!(?point, %error, "injected fault");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn take_zone_fault(&mut self, database: DatabaseScope, zone: &ZoneId) -> Option<RemoteError> {
        self.zone_faults
            .get_mut(&(database, zone.clone()))
            .and_then(VecDeque::pop_front)
    }

    fn ensure_zone(&mut self, database: DatabaseScope, zone: &ZoneId) -> bool {
        let generation = self.next_generation;
        let db = self.database(database);
        if db.zones.contains_key(zone) {
            return false;
        }
        db.zones.insert(zone.clone(), ZoneState::new(generation));
        db.log_zone(zone, ZoneChangeKind::Changed);
        self.next_generation += 1;
        true
    }

    fn put(&mut self, database: DatabaseScope, mut record: Record) -> Record {
        record.change_tag = Some(self.allocate_tag());
        let db = self.database(database);
        if let Some(zone) = db.zones.get_mut(&record.id.zone) {
            zone.store(record.clone());
            db.log_zone(&record.id.zone, ZoneChangeKind::Changed);
        }
        record
    }
}

/// Reference in-memory implementation of [`RemoteStore`].
///
/// Models private, shared and public databases with zones, per-zone change
/// logs, paging, optimistic concurrency through change tags, atomic batches,
/// cascading deletes, zone purge and deletion, cursor expiry and fault
/// injection. Helpers prefixed with server-side verbs (`put_record`,
/// `purge_zone`, ...) act as another device or the service itself.
///
/// # Example
///
/// ```
/// use zonesync_server::MemoryRemoteStore;
/// use zonesync_protocol::{DatabaseScope, ZoneId};
///
/// let store = MemoryRemoteStore::new();
/// store.ensure_zone(DatabaseScope::Private, &ZoneId::owned("todos"));
/// assert_eq!(store.zones(DatabaseScope::Private).len(), 2);
/// ```
pub struct MemoryRemoteStore {
    config: StoreConfig,
    state: Mutex<StoreState>,
}

impl MemoryRemoteStore {
    /// Creates a store with default limits.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given limits.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(StoreState::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates a zone if it does not exist. Returns true if it was created.
    pub fn ensure_zone(&self, database: DatabaseScope, zone: &ZoneId) -> bool {
        self.state.lock().ensure_zone(database, zone)
    }

    /// Zones of a database, including the default zone.
    pub fn zones(&self, database: DatabaseScope) -> Vec<ZoneId> {
        self.state
            .lock()
            .database(database)
            .zones
            .keys()
            .cloned()
            .collect()
    }

    /// Writes a record as another device would, bypassing conflict checks.
    pub fn put_record(&self, database: DatabaseScope, record: Record) -> StoreResult<Record> {
        let mut state = self.state.lock();
        if !state.database(database).zones.contains_key(&record.id.zone) {
            return Err(StoreError::UnknownZone {
                database,
                zone: record.id.zone,
            });
        }
        Ok(state.put(database, record))
    }

    /// Deletes a record (and its cascading children) as another device
    /// would. Returns every removed id.
    pub fn remove_record(&self, database: DatabaseScope, id: &RecordId) -> StoreResult<Vec<RecordId>> {
        let mut state = self.state.lock();
        let db = state.database(database);
        if !db.record_exists(id) {
            return Err(StoreError::UnknownRecord {
                database,
                id: id.clone(),
            });
        }
        Ok(db.delete_cascade(id))
    }

    /// Current server version of a record.
    pub fn record(&self, database: DatabaseScope, id: &RecordId) -> Option<Record> {
        self.state
            .lock()
            .database(database)
            .zones
            .get(&id.zone)?
            .get(&id.name)
            .cloned()
    }

    /// Every record of a zone.
    pub fn records(&self, database: DatabaseScope, zone: &ZoneId) -> Vec<Record> {
        self.state
            .lock()
            .database(database)
            .zones
            .get(zone)
            .map(|z| z.records.values().map(|s| s.current.clone()).collect())
            .unwrap_or_default()
    }

    /// Removes every record of a zone. The zone itself remains and its
    /// outstanding cursors stop being valid.
    pub fn purge_zone(&self, database: DatabaseScope, zone: &ZoneId) -> StoreResult<()> {
        let mut state = self.state.lock();
        let generation = state.allocate_generation();
        let db = state.database(database);
        let Some(existing) = db.zones.get_mut(zone) else {
            return Err(StoreError::UnknownZone {
                database,
                zone: zone.clone(),
            });
        };
        *existing = ZoneState::new(generation);
        db.log_zone(zone, ZoneChangeKind::Purged);
        debug!(%database, %zone, "zone purged");
        Ok(())
    }

    /// Deletes a zone with all its records.
    pub fn delete_zone(&self, database: DatabaseScope, zone: &ZoneId) -> StoreResult<()> {
        let mut state = self.state.lock();
        let db = state.database(database);
        if db.zones.remove(zone).is_none() {
            return Err(StoreError::UnknownZone {
                database,
                zone: zone.clone(),
            });
        }
        db.log_zone(zone, ZoneChangeKind::Deleted);
        debug!(%database, %zone, "zone deleted");
        Ok(())
    }

    /// Expires every outstanding database and zone cursor of a database.
    pub fn expire_tokens(&self, database: DatabaseScope) {
        let mut state = self.state.lock();
        let db = state.database(database);
        db.epoch += 1;
        debug!(%database, epoch = db.epoch, "change tokens expired");
    }

    /// Makes the next request at `point` fail with `error`. Faults queue up
    /// and are consumed one per request.
    pub fn inject_fault(&self, point: FaultPoint, error: RemoteError) {
        self.state
            .lock()
            .faults
            .entry(point)
            .or_default()
            .push_back(error);
    }

    /// Makes the next fetch of one zone fail with `error`, leaving the other
    /// zones of the same request unaffected.
    pub fn inject_zone_fault(&self, database: DatabaseScope, zone: &ZoneId, error: RemoteError) {
        self.state
            .lock()
            .zone_faults
            .entry((database, zone.clone()))
            .or_default()
            .push_back(error);
    }

    /// Returns true once a subscription exists for the database.
    pub fn is_subscribed(&self, database: DatabaseScope) -> bool {
        self.state.lock().database(database).subscribed
    }

    /// Number of requests received at `point`.
    pub fn request_count(&self, point: FaultPoint) -> usize {
        self.state
            .lock()
            .requests
            .get(&point)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_database_changes(
        &self,
        database: DatabaseScope,
        cursor: Option<&ChangeCursor>,
    ) -> RemoteResult<DatabaseChangesPage> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.begin(FaultPoint::DatabaseChanges)?;
        let db = state.database(database);

        let since = match cursor {
            None => 0,
            Some(cursor) => {
                let position = DatabasePosition::decode(cursor).ok_or_else(|| {
                    RemoteError::new(RemoteErrorCode::InvalidArguments, "malformed database cursor")
                })?;
                if position.epoch != db.epoch {
                    return Err(RemoteError::new(
                        RemoteErrorCode::ChangeTokenExpired,
                        "database change token expired",
                    ));
                }
                position.seq
            }
        };

        let page = db.changes_since(since, self.config.database_page_size);
        debug!(%database, since, zones = page.zones.len(), "database changes");
        Ok(DatabaseChangesPage {
            zones: page.zones,
            cursor: DatabasePosition {
                epoch: db.epoch,
                seq: page.last_seq,
            }
            .encode(),
            more_coming: page.more_coming,
        })
    }

    async fn fetch_zone_changes(
        &self,
        database: DatabaseScope,
        requests: &[ZoneFetchRequest],
    ) -> RemoteResult<Vec<ZoneFetchOutcome>> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.begin(FaultPoint::ZoneChanges)?;

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(error) = state.take_zone_fault(database, &request.zone) {
                outcomes.push(ZoneFetchOutcome::failed(request.zone.clone(), error));
                continue;
            }
            let db = state.database(database);
            outcomes.push(zone_outcome(db, request, self.config.zone_page_size));
        }
        Ok(outcomes)
    }

    async fn modify_records(
        &self,
        database: DatabaseScope,
        save: &[Record],
        delete: &[RecordId],
    ) -> RemoteResult<ModifyOutcome> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.begin(FaultPoint::Modify)?;

        if save.len() + delete.len() > self.config.max_batch_size {
            return Err(RemoteError::new(
                RemoteErrorCode::LimitExceeded,
                format!(
                    "batch of {} exceeds the limit of {}",
                    save.len() + delete.len(),
                    self.config.max_batch_size
                ),
            ));
        }

        let failures = validate_batch(state.database(database), save, delete);
        if !failures.is_empty() {
            debug!(%database, failed = failures.len(), "batch rejected");
            return Ok(ModifyOutcome {
                saved: Vec::new(),
                deleted: Vec::new(),
                error: Some(RemoteError::partial(failures)),
            });
        }

        let mut saved = Vec::with_capacity(save.len());
        for record in save {
            saved.push(state.put(database, record.clone()));
        }
        let db = state.database(database);
        let mut deleted = Vec::new();
        for id in delete {
            let removed = db.delete_cascade(id);
            if removed.is_empty() {
                // Deleting an absent record succeeds.
                deleted.push(id.clone());
            }
            deleted.extend(removed);
        }

        debug!(%database, saved = saved.len(), deleted = deleted.len(), "batch applied");
        Ok(ModifyOutcome {
            saved,
            deleted,
            error: None,
        })
    }

    async fn create_zone(&self, database: DatabaseScope, zone: &ZoneId) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.begin(FaultPoint::CreateZone)?;
        if database == DatabaseScope::Public && !zone.is_default() {
            return Err(RemoteError::new(
                RemoteErrorCode::InvalidArguments,
                "the public database only has the default zone",
            ));
        }
        if state.ensure_zone(database, zone) {
            debug!(%database, %zone, "zone created");
        }
        Ok(())
    }

    async fn subscribe_to_database(&self, database: DatabaseScope) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.begin(FaultPoint::Subscribe)?;
        state.database(database).subscribed = true;
        Ok(())
    }
}

fn zone_outcome(db: &DatabaseState, request: &ZoneFetchRequest, limit: usize) -> ZoneFetchOutcome {
    let zone_id = &request.zone;
    let Some(zone) = db.zones.get(zone_id) else {
        return ZoneFetchOutcome::failed(
            zone_id.clone(),
            RemoteError::new(RemoteErrorCode::ZoneNotFound, format!("zone {zone_id} does not exist")),
        );
    };

    let since = match &request.cursor {
        None => 0,
        Some(cursor) => match ZonePosition::decode(cursor) {
            None => {
                return ZoneFetchOutcome::failed(
                    zone_id.clone(),
                    RemoteError::new(RemoteErrorCode::InvalidArguments, "malformed zone cursor"),
                )
            }
            Some(position) if position.epoch != db.epoch || position.generation != zone.generation => {
                return ZoneFetchOutcome::failed(
                    zone_id.clone(),
                    RemoteError::new(
                        RemoteErrorCode::ChangeTokenExpired,
                        format!("change token for zone {zone_id} expired"),
                    ),
                )
            }
            Some(position) => position.seq,
        },
    };

    let page = zone.changes_since(since, limit);
    let changes = page
        .names
        .into_iter()
        .map(|(name, record_type)| match zone.get(&name) {
            Some(record) => ZoneChange::RecordChanged(record.clone()),
            None => ZoneChange::RecordDeleted {
                id: RecordId::new(zone_id.clone(), name),
                record_type,
            },
        })
        .collect();

    ZoneFetchOutcome::completed(
        zone_id.clone(),
        changes,
        ZonePosition {
            epoch: db.epoch,
            generation: zone.generation,
            seq: page.last_seq,
        }
        .encode(),
        page.more_coming,
    )
}

/// Checks every item of a batch. When any item fails, every other item is
/// reported as failed by association, since batches are atomic.
fn validate_batch(
    db: &DatabaseState,
    save: &[Record],
    delete: &[RecordId],
) -> Vec<(ItemKey, RemoteError)> {
    let in_batch: HashSet<&RecordId> = save.iter().map(|r| &r.id).collect();
    let mut results: Vec<(ItemKey, Option<RemoteError>)> = Vec::new();

    for record in save {
        results.push((
            ItemKey::Record(record.id.clone()),
            validate_save(db, record, &in_batch).err(),
        ));
    }
    for id in delete {
        let error = (!db.zones.contains_key(&id.zone)).then(|| {
            RemoteError::new(RemoteErrorCode::ZoneNotFound, format!("zone {} does not exist", id.zone))
        });
        results.push((ItemKey::Record(id.clone()), error));
    }

    if results.iter().all(|(_, error)| error.is_none()) {
        return Vec::new();
    }
    results
        .into_iter()
        .map(|(key, error)| {
            let error = error.unwrap_or_else(|| {
                RemoteError::new(
                    RemoteErrorCode::BatchRequestFailed,
                    "another item of the atomic batch failed",
                )
            });
            (key, error)
        })
        .collect()
}

fn validate_save(
    db: &DatabaseState,
    record: &Record,
    in_batch: &HashSet<&RecordId>,
) -> RemoteResult<()> {
    let Some(zone) = db.zones.get(&record.id.zone) else {
        return Err(RemoteError::new(
            RemoteErrorCode::ZoneNotFound,
            format!("zone {} does not exist", record.id.zone),
        ));
    };

    match (zone.get(&record.id.name), &record.change_tag) {
        (Some(server), None) => {
            return Err(RemoteError::record_changed(server.clone(), None, record.clone()));
        }
        (Some(server), Some(tag)) if server.change_tag.as_ref() != Some(tag) => {
            let ancestor = zone.version(&record.id.name, tag).cloned();
            return Err(RemoteError::record_changed(server.clone(), ancestor, record.clone()));
        }
        (None, Some(_)) => {
            return Err(RemoteError::new(
                RemoteErrorCode::UnknownItem,
                format!("record {} no longer exists", record.id),
            ));
        }
        _ => {}
    }

    if let Some(parent) = &record.parent {
        if parent.action == ReferenceAction::DeleteSelf
            && !db.record_exists(&parent.id)
            && !in_batch.contains(&parent.id)
        {
            return Err(RemoteError::new(
                RemoteErrorCode::ReferenceViolation,
                format!("parent {} does not exist", parent.id),
            ));
        }
    }

    if record.is_share() {
        check_not_already_shared(db, record)?;
    }
    Ok(())
}

/// A root may have only one share at a time.
fn check_not_already_shared(db: &DatabaseState, share: &Record) -> RemoteResult<()> {
    let Some(root_id) = share
        .field(SHARE_ROOT_FIELD)
        .and_then(FieldValue::as_reference)
        .map(|r| &r.id)
    else {
        return Ok(());
    };
    let existing = db
        .zones
        .get(&root_id.zone)
        .and_then(|zone| zone.get(&root_id.name))
        .and_then(|root| root.share.as_ref())
        .filter(|current| current.id != share.id && db.record_exists(&current.id));

    match existing {
        Some(current) => Err(RemoteError::new(
            RemoteErrorCode::AlreadyShared,
            format!("record {root_id} is already shared by {}", current.id),
        )),
        None => Ok(()),
    }
}
