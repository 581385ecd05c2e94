use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted record of a call awaiting payment confirmation.
///
/// Written at payment initiation, read back (and deleted) when the payment is
/// confirmed. `captured_args` is the opaque argument payload the caller sent;
/// it must round-trip byte-for-byte so the deferred execution sees exactly the
/// original call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub payment_id: String,
    pub provider_name: String,
    pub operation_name: String,
    pub captured_args: Value,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl PendingOperation {
    pub fn new(
        payment_id: impl Into<String>,
        provider_name: impl Into<String>,
        operation_name: impl Into<String>,
        captured_args: Value,
    ) -> Self {
        Self {
            payment_id: payment_id.into(),
            provider_name: provider_name.into(),
            operation_name: operation_name.into(),
            captured_args,
            created_at: now_millis(),
            owner_session_id: None,
            client_id: None,
            metadata: Map::new(),
        }
    }

    pub fn with_owner_session(mut self, session_id: impl Into<String>) -> Self {
        self.owner_session_id = Some(session_id.into());
        self
    }

    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
