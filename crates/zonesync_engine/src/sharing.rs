//! Share creation.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::events::RecordsChanged;
use tracing::{debug, info, instrument};
use zonesync_protocol::{
    build_share, DatabaseScope, ItemKey, ListFields, Record, RecordType, TodoFields,
};

impl SyncEngine {
    #[instrument(skip(self, record), fields(root = %record.id))]
    pub(crate) async fn share_record(
        &self,
        database: DatabaseScope,
        record: &Record,
    ) -> SyncResult<Record> {
        if let Some(existing) = self.cached_share(database, record) {
            debug!(share = %existing.id, "share already exists");
            return Ok(existing);
        }

        let (root, share) = build_share(record, share_title(record));
        let key = ItemKey::Record(share.id.clone());
        let outcome = self
            .remote
            .modify_records(database, &[root, share.clone()], &[])
            .await
            .map_err(|e| self.write_failure(database, e))?;
        if let Some(error) = outcome.error {
            return Err(self.item_failure(database, &key, error));
        }

        let mut change = RecordsChanged::new(database);
        let mut created = None;
        {
            let mut cache = self.cache.write();
            for saved in outcome.saved {
                if saved.id == share.id {
                    created = Some(saved.clone());
                }
                change.upserted.push(saved.id.clone());
                cache.upsert(database, saved);
            }
        }
        self.publish(change);

        let created = created.ok_or_else(|| {
            SyncError::Protocol(format!("share {} was not confirmed", share.id))
        })?;
        info!(share = %created.id, "share created");
        Ok(created)
    }

    /// The cached share the record points at, if any.
    fn cached_share(&self, database: DatabaseScope, record: &Record) -> Option<Record> {
        let reference = record.share.as_ref()?;
        self.cache
            .read()
            .get(database, &reference.id)
            .filter(|share| share.is_share())
            .cloned()
    }
}

fn share_title(record: &Record) -> String {
    let title = match record.record_type {
        RecordType::List => ListFields::from_record(record).ok().map(|f| f.title),
        RecordType::Todo => TodoFields::from_record(record).ok().map(|f| f.title),
        _ => None,
    };
    title.unwrap_or_else(|| record.id.name.clone())
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::SyncEngine;
    use crate::remote::{MockCall, MockRemote};
    use std::sync::Arc;
    use zonesync_protocol::{
        DatabaseScope, FieldValue, ListDraft, RecordType, SHARE_ROOT_FIELD, SHARE_TITLE_FIELD,
    };

    #[tokio::test]
    async fn share_is_created_once() {
        let mock = Arc::new(MockRemote::new());
        let engine = SyncEngine::new(EngineConfig::default(), mock.clone());
        engine.start().await.unwrap();
        let list = engine
            .create_record(
                DatabaseScope::Private,
                ListDraft::new("Groceries").unwrap(),
                None,
            )
            .await
            .unwrap();
        let mut rx = engine.subscribe();

        let share = engine.share_for(DatabaseScope::Private, &list).await.unwrap();
        assert_eq!(share.record_type, RecordType::Share);
        assert_eq!(
            share.field(SHARE_TITLE_FIELD),
            Some(&FieldValue::String("Groceries".into()))
        );
        assert_eq!(
            share
                .field(SHARE_ROOT_FIELD)
                .and_then(FieldValue::as_reference)
                .map(|r| r.id.clone()),
            Some(list.id.clone())
        );
        assert_eq!(engine.shares_view().len(), 1);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.upserted.len(), 2);
        assert!(rx.try_recv().is_err());

        // The cached root now points at the share; no second round trip.
        let root = engine.get(DatabaseScope::Private, &list.id).unwrap();
        let calls_before = mock.calls().len();
        let again = engine.share_for(DatabaseScope::Private, &root).await.unwrap();
        assert_eq!(again, share);
        assert_eq!(mock.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn stop_sharing_removes_share() {
        let mock = Arc::new(MockRemote::new());
        let engine = SyncEngine::new(EngineConfig::default(), mock.clone());
        engine.start().await.unwrap();
        let list = engine
            .create_record(DatabaseScope::Private, ListDraft::new("Chores").unwrap(), None)
            .await
            .unwrap();
        let share = engine.share_for(DatabaseScope::Private, &list).await.unwrap();

        engine
            .stop_sharing(DatabaseScope::Private, &share.id)
            .await
            .unwrap();
        assert!(engine.shares_view().is_empty());
        assert!(matches!(
            mock.calls().last(),
            Some(MockCall::Modify(DatabaseScope::Private, saved, deleted))
                if saved.is_empty() && deleted == &vec![share.id.clone()]
        ));
    }
}
