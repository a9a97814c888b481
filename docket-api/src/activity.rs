//! Activity recording
//!
//! A mutating call that succeeded is persisted as an [`Activity`]. Only once
//! the activity is stored is its broadcast published on the activity topic.
//! Neither step can fail the request that produced it.

use docket_broker::{topics, Broker, BrokerPayload};
use docket_core::{Activity, ActivityBroadcast};
use docket_db::DocketDatabase;
use std::sync::Arc;

/// Title and description attached to a broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub description: String,
}

/// What happened to one recorded activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Persisting failed; nothing was published
    NotStored,
    Stored,
    /// Stored and handed to the broker
    Published,
    /// Stored, but the broker rejected the publish
    PublishFailed,
}

pub struct ActivityRecorder {
    database: Arc<DocketDatabase>,
    broker: Arc<dyn Broker>,
}

impl ActivityRecorder {
    pub fn new(database: Arc<DocketDatabase>, broker: Arc<dyn Broker>) -> Self {
        Self { database, broker }
    }

    /// Persist an activity, then publish it when an announcement is given
    pub async fn record(&self, activity: Activity, announcement: Option<Announcement>) -> RecordOutcome {
        if let Err(e) = self.database.activities.record(&activity).await {
            tracing::error!(
                tenant_id = %activity.tenant_ref,
                path = %activity.path,
                error = %e,
                "Failed to persist activity"
            );
            return RecordOutcome::NotStored;
        }

        let Some(announcement) = announcement else {
            return RecordOutcome::Stored;
        };

        let broadcast =
            ActivityBroadcast::from_activity(&activity, &announcement.title, &announcement.description);
        match self
            .broker
            .publish(topics::ACTIVITY, BrokerPayload::Activity(broadcast))
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    tenant_id = %activity.tenant_ref,
                    path = %activity.path,
                    verb = %activity.verb,
                    "Activity published"
                );
                RecordOutcome::Published
            }
            Err(e) => {
                tracing::warn!(
                    topic = topics::ACTIVITY,
                    error = %e,
                    "Failed to publish activity"
                );
                RecordOutcome::PublishFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docket_broker::{DisconnectedBroker, MemoryBroker};
    use docket_core::{TenantId, Visibility};
    use docket_db::{ListQuery, MemoryStore};
    use serde_json::Value;

    fn activity() -> Activity {
        Activity {
            id: "a1".to_string(),
            path: "company/abc".to_string(),
            path_spec: "company/:id".to_string(),
            verb: "delete".to_string(),
            permissions: vec!["delete".to_string()],
            params: Default::default(),
            query: Default::default(),
            body: Value::Null,
            response: Value::Null,
            visibility: Visibility::Tenant,
            token_ref: "ref".to_string(),
            user_ref: None,
            tenant_ref: TenantId::from("acme"),
            timestamp: Utc::now(),
        }
    }

    fn announcement() -> Option<Announcement> {
        Some(Announcement {
            title: "Document deleted".to_string(),
            description: "delete company/abc".to_string(),
        })
    }

    #[tokio::test]
    async fn test_publish_after_persist() {
        let database = Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())));
        let broker = MemoryBroker::new();
        let mut subscription = broker.subscribe(topics::ACTIVITY).await.unwrap();
        let recorder = ActivityRecorder::new(database.clone(), Arc::new(broker));

        let outcome = recorder.record(activity(), announcement()).await;
        assert_eq!(outcome, RecordOutcome::Published);

        let stored = database
            .activities
            .list(&TenantId::from("acme"), &ListQuery::all())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);

        match subscription.try_recv().unwrap().payload {
            BrokerPayload::Activity(b) => {
                assert_eq!(b.path, "company/abc");
                assert_eq!(b.activity_id, "a1");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unannounced_activity_is_only_stored() {
        let database = Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())));
        let broker = MemoryBroker::new();
        let mut subscription = broker.subscribe(topics::ACTIVITY).await.unwrap();
        let recorder = ActivityRecorder::new(database, Arc::new(broker));

        assert_eq!(recorder.record(activity(), None).await, RecordOutcome::Stored);
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_activity_is_not_published() {
        let database = Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())));
        let broker = MemoryBroker::new();
        let mut subscription = broker.subscribe(topics::ACTIVITY).await.unwrap();
        let recorder = ActivityRecorder::new(database, Arc::new(broker));

        recorder.record(activity(), announcement()).await;
        subscription.try_recv().unwrap();

        // Same id again: the insert fails, so no broadcast
        let outcome = recorder.record(activity(), announcement()).await;
        assert_eq!(outcome, RecordOutcome::NotStored);
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let database = Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())));
        let recorder = ActivityRecorder::new(database, Arc::new(DisconnectedBroker));
        assert_eq!(
            recorder.record(activity(), announcement()).await,
            RecordOutcome::PublishFailed
        );
    }
}
