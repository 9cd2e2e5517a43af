//! Server-confirmed writes.
//!
//! Every write goes to the remote store first. The cache is only touched
//! with what the server confirmed, so a failed write leaves it exactly as it
//! was.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::events::RecordsChanged;
use tracing::{info, instrument, warn};
use zonesync_protocol::{
    DatabaseScope, ItemKey, Record, RecordDraft, RecordId, RecordReference, RemoteError, ZoneId,
};

impl SyncEngine {
    #[instrument(skip(self, record), fields(record = %record.id))]
    pub(crate) async fn save_record(
        &self,
        database: DatabaseScope,
        record: Record,
    ) -> SyncResult<Record> {
        let key = ItemKey::Record(record.id.clone());
        let outcome = self
            .remote
            .modify_records(database, std::slice::from_ref(&record), &[])
            .await
            .map_err(|e| self.item_failure(database, &key, e))?;
        if let Some(error) = outcome.error {
            return Err(self.item_failure(database, &key, error));
        }

        let saved = outcome
            .saved
            .into_iter()
            .find(|r| r.id == record.id)
            .ok_or_else(|| {
                SyncError::Protocol(format!("save of {} was not confirmed", record.id))
            })?;

        self.cache.write().upsert(database, saved.clone());

        let mut change = RecordsChanged::new(database);
        change.upserted.push(saved.id.clone());
        self.publish(change);
        info!(record_type = %saved.record_type.type_name(), "record saved");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub(crate) async fn delete_record(
        &self,
        database: DatabaseScope,
        id: &RecordId,
    ) -> SyncResult<()> {
        let key = ItemKey::Record(id.clone());
        let outcome = self
            .remote
            .modify_records(database, &[], std::slice::from_ref(id))
            .await
            .map_err(|e| self.item_failure(database, &key, e))?;
        if let Some(error) = outcome.error {
            return Err(self.item_failure(database, &key, error));
        }

        let mut change = RecordsChanged::new(database);
        {
            let mut cache = self.cache.write();
            for deleted in outcome.deleted {
                if cache.remove(database, &deleted).is_some() {
                    change.deleted.push(deleted);
                }
            }
        }
        info!(removed = change.deleted.len(), "record deleted");
        self.publish(change);
        Ok(())
    }

    #[instrument(skip(self, draft))]
    pub(crate) async fn create(
        &self,
        database: DatabaseScope,
        draft: RecordDraft,
        parent: Option<&RecordId>,
    ) -> SyncResult<Record> {
        let zone = self.zone_for_new_record(database, parent)?;
        let record = draft.into_record(
            RecordId::generate(zone),
            parent.cloned().map(RecordReference::cascading),
        );
        self.save_record(database, record).await
    }

    /// Resolves the zone a new record is created in.
    fn zone_for_new_record(
        &self,
        database: DatabaseScope,
        parent: Option<&RecordId>,
    ) -> SyncResult<ZoneId> {
        if let Some(parent) = parent {
            return Ok(parent.zone.clone());
        }
        match database {
            DatabaseScope::Private => self
                .known_zone
                .read()
                .clone()
                .ok_or(SyncError::ZoneNotYetKnown { database }),
            DatabaseScope::Public => Ok(ZoneId::default_zone()),
            DatabaseScope::Shared => Err(SyncError::ZoneNotYetKnown { database }),
        }
    }

    /// Classifies the failure of a request about a single item.
    pub(crate) fn item_failure(
        &self,
        database: DatabaseScope,
        key: &ItemKey,
        error: RemoteError,
    ) -> SyncError {
        let strategy = self.classifier.classify_for_item(&error, key);
        warn!(%database, %error, %strategy, "write failed");
        SyncError::Remote {
            database,
            error,
            strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::SyncEngine;
    use crate::error::SyncError;
    use crate::remote::{MockCall, MockRemote};
    use crate::RetryStrategy;
    use std::sync::Arc;
    use std::time::Duration;
    use zonesync_protocol::{
        DatabaseScope, FieldValue, ItemKey, ListDraft, ModifyOutcome, Record, RecordId, RecordType,
        ReferenceAction, RemoteError, RemoteErrorCode, TodoDraft, TodoFields, ZoneId,
    };

    fn setup() -> (Arc<MockRemote>, SyncEngine) {
        let mock = Arc::new(MockRemote::new());
        let engine = SyncEngine::new(EngineConfig::default(), mock.clone());
        (mock, engine)
    }

    #[tokio::test]
    async fn private_create_requires_known_zone() {
        let (mock, engine) = setup();
        let err = engine
            .create_record(DatabaseScope::Private, ListDraft::new("Inbox").unwrap(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::ZoneNotYetKnown {
                database: DatabaseScope::Private
            }
        ));
        assert!(err.is_local());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn shared_create_without_parent_is_rejected() {
        let (_, engine) = setup();
        let err = engine
            .create_record(DatabaseScope::Shared, ListDraft::new("Inbox").unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ZoneNotYetKnown { .. }));
    }

    #[tokio::test]
    async fn public_create_uses_default_zone() {
        let (_, engine) = setup();
        let record = engine
            .create_record(DatabaseScope::Public, ListDraft::new("Inbox").unwrap(), None)
            .await
            .unwrap();
        assert!(record.id.zone.is_default());
    }

    #[tokio::test]
    async fn child_lands_in_parent_zone_with_cascade() {
        let (_, engine) = setup();
        let parent = RecordId::new(ZoneId::new("todos", "alice"), "list-1");

        let todo = engine
            .create_record(
                DatabaseScope::Shared,
                TodoDraft::new("Milk").unwrap(),
                Some(&parent),
            )
            .await
            .unwrap();

        assert_eq!(todo.id.zone, parent.zone);
        let parent_ref = todo.parent.as_ref().unwrap();
        assert_eq!(parent_ref.id, parent);
        assert_eq!(parent_ref.action, ReferenceAction::DeleteSelf);
        assert_eq!(
            TodoFields::from_record(&todo).unwrap().list,
            Some(parent.clone())
        );
        assert_eq!(engine.get(DatabaseScope::Shared, &todo.id), Some(todo));
    }

    #[tokio::test]
    async fn save_emits_one_event() {
        let (_, engine) = setup();
        engine.start().await.unwrap();
        let mut rx = engine.subscribe();

        let list = engine
            .create_record(DatabaseScope::Private, ListDraft::new("Inbox").unwrap(), None)
            .await
            .unwrap();

        assert!(list.is_saved());
        assert_eq!(rx.try_recv().unwrap().upserted, vec![list.id]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_save_leaves_cache_untouched() {
        let (mock, engine) = setup();
        let id = RecordId::new(ZoneId::owned("todos"), "a");
        let original = Record::new(id.clone(), RecordType::List);
        engine
            .cache
            .write()
            .upsert(DatabaseScope::Private, original.clone());
        let before = engine.cache.read().entries();

        mock.push_modify_response(Err(RemoteError::new(
            RemoteErrorCode::QuotaExceeded,
            "full",
        )));
        let mut rx = engine.subscribe();
        let err = engine
            .save(DatabaseScope::Private, original)
            .await
            .unwrap_err();

        assert_eq!(err.strategy(), Some(&RetryStrategy::Unknown));
        assert_eq!(engine.cache.read().entries(), before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rate_limited_save_reports_delay_and_keeps_cache() {
        let (mock, engine) = setup();
        let id = RecordId::new(ZoneId::owned("todos"), "a");
        let mut edited = Record::new(id, RecordType::List);
        engine
            .cache
            .write()
            .upsert(DatabaseScope::Private, edited.clone());
        let before = engine.snapshot();

        mock.push_modify_response(Err(RemoteError::new(
            RemoteErrorCode::RequestRateLimited,
            "slow down",
        )
        .with_retry_after(Duration::from_secs(5))));
        edited.set_field("title", FieldValue::String("Renamed".into()));
        let err = engine
            .save(DatabaseScope::Private, edited)
            .await
            .unwrap_err();

        assert_eq!(
            err.strategy(),
            Some(&RetryStrategy::RetryAfter(Some(Duration::from_secs(5))))
        );
        assert_eq!(engine.snapshot(), before);
    }

    #[tokio::test]
    async fn single_item_partial_failure_is_unwrapped() {
        let (mock, engine) = setup();
        let id = RecordId::new(ZoneId::owned("todos"), "a");
        mock.push_modify_response(Ok(ModifyOutcome {
            saved: vec![],
            deleted: vec![],
            error: Some(RemoteError::partial(vec![(
                ItemKey::Record(id.clone()),
                RemoteError::new(RemoteErrorCode::ZoneNotFound, "no zone"),
            )])),
        }));

        let err = engine
            .save(DatabaseScope::Private, Record::new(id, RecordType::Todo))
            .await
            .unwrap_err();
        assert_eq!(err.strategy(), Some(&RetryStrategy::ReconcileThenRetry));
        assert_eq!(engine.cached_records(), 0);
    }

    #[tokio::test]
    async fn delete_removes_confirmed_ids() {
        let (mock, engine) = setup();
        let id = RecordId::new(ZoneId::owned("todos"), "a");
        engine
            .cache
            .write()
            .upsert(DatabaseScope::Private, Record::new(id.clone(), RecordType::Todo));
        let mut rx = engine.subscribe();

        engine.delete(DatabaseScope::Private, &id).await.unwrap();

        assert!(engine.get(DatabaseScope::Private, &id).is_none());
        assert_eq!(rx.try_recv().unwrap().deleted, vec![id.clone()]);
        assert_eq!(
            mock.calls(),
            vec![MockCall::Modify(DatabaseScope::Private, vec![], vec![id])]
        );
    }
}
