use super::payment::PaymentStatus;
use super::pending::PendingOperation;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;

/// TTL key-value persistence for in-flight call arguments.
///
/// Implementations must be safe for concurrent use; writes to the same key are
/// last-write-wins and there is no ordering guarantee across keys. An entry
/// past its TTL reads as absent even before any sweep runs.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn set(&self, key: &str, record: PendingOperation, ttl: Option<Duration>)
    -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<PendingOperation>>;
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Drops every entry. Mostly useful in tests.
    async fn clear(&self) -> Result<()>;

    /// Evicts expired entries. Backends with native TTLs may no-op.
    async fn cleanup(&self) -> Result<()>;
}

/// External payment provider behind a minimal consumed surface.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Vendor identifier, used in storage keys and index entries.
    fn name(&self) -> &str;

    async fn create_payment(
        &self,
        amount: Decimal,
        currency: &str,
        description: &str,
    ) -> Result<(String, String)>;

    /// Live status for a payment, already folded into [`PaymentStatus`].
    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentStatus>;
}

/// The protected operation: a callable that must not run before payment.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

/// Caller's answer to an accept/cancel prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAction {
    Accept,
    Cancel,
}

/// Host primitive for synchronously prompting the caller mid-call.
#[async_trait]
pub trait InteractiveChannel: Send + Sync {
    async fn prompt(&self, message: &str) -> Result<PromptAction>;
}

/// Host primitive for emitting progress updates while a call is held open.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, message: &str, percent: u8);
}

/// Host primitive for announcing that the operation catalog changed.
#[async_trait]
pub trait CatalogNotifier: Send + Sync {
    async fn catalog_changed(&self);
}

/// One entry of the host's operation catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEntry {
    pub name: String,
    pub description: String,
}

impl OperationEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Handle returned by [`OperationCatalog::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
}

/// The host's enumerable list of currently invocable operations.
///
/// The list-change flow adds and removes one-off confirmation operations
/// through this collaborator; the core never reaches into host registries.
#[async_trait]
pub trait OperationCatalog: Send + Sync {
    async fn register(&self, entry: OperationEntry) -> Result<OperationHandle>;
    async fn unregister(&self, name: &str) -> Result<()>;
    async fn list(&self) -> Vec<OperationEntry>;
}
