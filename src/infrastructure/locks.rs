use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Mutual exclusion keyed by payment id.
///
/// Confirmation paths acquire the payment's lock before the
/// read-check-execute-delete sequence, so near-simultaneous confirmations for
/// one payment serialize and the wrapped operation runs at most once. The
/// guard is RAII: it releases on every exit path, including operation
/// failure. Non-reentrant within one acquisition.
#[derive(Default)]
pub struct PaymentLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PaymentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, payment_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().expect("lock table poisoned");
            table
                .entry(payment_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drops a payment's table entry once nobody holds or awaits it.
    ///
    /// Safe to call after a terminal transition; if the entry is still
    /// referenced (strong count above the table's own) it is kept, which
    /// preserves mutual exclusion for the tasks still queued on it.
    pub fn discard(&self, payment_id: &str) {
        let mut table = self.table.lock().expect("lock table poisoned");
        if let Some(lock) = table.get(payment_id) {
            if Arc::strong_count(lock) == 1 {
                table.remove(payment_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.lock().expect("lock table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
