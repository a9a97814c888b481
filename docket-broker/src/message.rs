//! Broker message types

use chrono::{DateTime, Utc};
use docket_core::{ActivityBroadcast, TenantId};
use serde::{Deserialize, Serialize};

/// Well-known topics
pub mod topics {
    /// Committed activities published by the REST tier
    pub const ACTIVITY: &str = "docket:activity";
    /// Tenant schema replaced
    pub const SCHEMA_CHANGED: &str = "docket:schema-changed";
    /// Broadcast adapter channel shared by realtime workers
    pub const REALTIME: &str = "docket:realtime";
}

/// Broker message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerMessage {
    pub message_id: String,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub payload: BrokerPayload,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: BrokerPayload) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Message payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BrokerPayload {
    /// `{tenantId}` of a tenant whose schema changed
    SchemaChanged(SchemaChanged),
    /// Committed activity for realtime delivery
    Activity(ActivityBroadcast),
}

impl BrokerPayload {
    pub fn message_type(&self) -> &'static str {
        match self {
            BrokerPayload::SchemaChanged(_) => "schema_changed",
            BrokerPayload::Activity(_) => "activity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChanged {
    pub tenant_id: TenantId,
}
