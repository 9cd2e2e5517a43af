//! Remote record store abstraction.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use zonesync_protocol::{
    ChangeCursor, ChangeTag, DatabaseChangesPage, DatabaseScope, ModifyOutcome, Record, RecordId,
    RemoteResult, ZoneFetchOutcome, ZoneFetchRequest, ZoneId,
};

/// A remote record store.
///
/// This trait abstracts the network client, allowing for different
/// implementations (a real API client, the in-memory reference store,
/// mocks for testing). Every call is one round trip.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches one page of zone-level changes of a database since `cursor`.
    async fn fetch_database_changes(
        &self,
        database: DatabaseScope,
        cursor: Option<&ChangeCursor>,
    ) -> RemoteResult<DatabaseChangesPage>;

    /// Fetches record changes of several zones in one combined request.
    async fn fetch_zone_changes(
        &self,
        database: DatabaseScope,
        requests: &[ZoneFetchRequest],
    ) -> RemoteResult<Vec<ZoneFetchOutcome>>;

    /// Saves and deletes records in one batch.
    async fn modify_records(
        &self,
        database: DatabaseScope,
        save: &[Record],
        delete: &[RecordId],
    ) -> RemoteResult<ModifyOutcome>;

    /// Creates a zone. Creating an existing zone succeeds.
    async fn create_zone(&self, database: DatabaseScope, zone: &ZoneId) -> RemoteResult<()>;

    /// Ensures change notifications exist for a database. Idempotent.
    async fn subscribe_to_database(&self, database: DatabaseScope) -> RemoteResult<()>;
}

/// A call recorded by [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `fetch_database_changes`.
    DatabaseChanges(DatabaseScope, Option<ChangeCursor>),
    /// `fetch_zone_changes`.
    ZoneChanges(DatabaseScope, Vec<ZoneFetchRequest>),
    /// `modify_records`.
    Modify(DatabaseScope, Vec<RecordId>, Vec<RecordId>),
    /// `create_zone`.
    CreateZone(DatabaseScope, ZoneId),
    /// `subscribe_to_database`.
    Subscribe(DatabaseScope),
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    database_pages: HashMap<DatabaseScope, VecDeque<RemoteResult<DatabaseChangesPage>>>,
    zone_responses: VecDeque<RemoteResult<Vec<ZoneFetchOutcome>>>,
    modify_responses: VecDeque<RemoteResult<ModifyOutcome>>,
    zone_results: VecDeque<RemoteResult<()>>,
    subscribe_results: VecDeque<RemoteResult<()>>,
    next_tag: u64,
}

/// A scripted remote store for testing.
///
/// Queued responses are returned in order. When a queue is empty the mock
/// answers as an unchanged store would: empty database pages, empty zone
/// outcomes, and writes echoed back with fresh change tags.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
}

impl MockRemote {
    /// Creates a mock with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a database changes response.
    pub fn push_database_page(
        &self,
        database: DatabaseScope,
        page: RemoteResult<DatabaseChangesPage>,
    ) {
        self.state
            .lock()
            .database_pages
            .entry(database)
            .or_default()
            .push_back(page);
    }

    /// Queues a zone changes response.
    pub fn push_zone_response(&self, response: RemoteResult<Vec<ZoneFetchOutcome>>) {
        self.state.lock().zone_responses.push_back(response);
    }

    /// Queues a modify response.
    pub fn push_modify_response(&self, response: RemoteResult<ModifyOutcome>) {
        self.state.lock().modify_responses.push_back(response);
    }

    /// Queues a create-zone result.
    pub fn push_create_zone_result(&self, result: RemoteResult<()>) {
        self.state.lock().zone_results.push_back(result);
    }

    /// Queues a subscribe result.
    pub fn push_subscribe_result(&self, result: RemoteResult<()>) {
        self.state.lock().subscribe_results.push_back(result);
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of zone change fetches made so far.
    pub fn zone_fetch_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::ZoneChanges(..)))
            .count()
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn fetch_database_changes(
        &self,
        database: DatabaseScope,
        cursor: Option<&ChangeCursor>,
    ) -> RemoteResult<DatabaseChangesPage> {
        let mut state = self.state.lock();
        state
            .calls
            .push(MockCall::DatabaseChanges(database, cursor.cloned()));
        match state
            .database_pages
            .get_mut(&database)
            .and_then(VecDeque::pop_front)
        {
            Some(page) => page,
            None => Ok(DatabaseChangesPage {
                zones: Vec::new(),
                cursor: cursor
                    .cloned()
                    .unwrap_or_else(|| ChangeCursor::from_bytes(b"mock".to_vec())),
                more_coming: false,
            }),
        }
    }

    async fn fetch_zone_changes(
        &self,
        database: DatabaseScope,
        requests: &[ZoneFetchRequest],
    ) -> RemoteResult<Vec<ZoneFetchOutcome>> {
        let mut state = self.state.lock();
        state
            .calls
            .push(MockCall::ZoneChanges(database, requests.to_vec()));
        match state.zone_responses.pop_front() {
            Some(response) => response,
            None => Ok(requests
                .iter()
                .map(|r| {
                    let cursor = r
                        .cursor
                        .clone()
                        .unwrap_or_else(|| ChangeCursor::from_bytes(b"mock".to_vec()));
                    ZoneFetchOutcome::completed(r.zone.clone(), Vec::new(), cursor, false)
                })
                .collect()),
        }
    }

    async fn modify_records(
        &self,
        database: DatabaseScope,
        save: &[Record],
        delete: &[RecordId],
    ) -> RemoteResult<ModifyOutcome> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Modify(
            database,
            save.iter().map(|r| r.id.clone()).collect(),
            delete.to_vec(),
        ));
        if let Some(response) = state.modify_responses.pop_front() {
            return response;
        }

        let mut saved = Vec::with_capacity(save.len());
        for record in save {
            state.next_tag += 1;
            let mut record = record.clone();
            record.change_tag = Some(ChangeTag::new(format!("mock-{}", state.next_tag)));
            saved.push(record);
        }
        Ok(ModifyOutcome {
            saved,
            deleted: delete.to_vec(),
            error: None,
        })
    }

    async fn create_zone(&self, database: DatabaseScope, zone: &ZoneId) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::CreateZone(database, zone.clone()));
        state.zone_results.pop_front().unwrap_or(Ok(()))
    }

    async fn subscribe_to_database(&self, database: DatabaseScope) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Subscribe(database));
        state.subscribe_results.pop_front().unwrap_or(Ok(()))
    }
}
