use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct IndexEntry {
    operation_name: String,
    payment_url: String,
    created_at: Instant,
    client_id: Option<String>,
}

/// Secondary index of pending payments, keyed by `provider:payment_id`.
///
/// This lets a caller that lost its response (timeout, disconnect) recover a
/// pending payment without supplying the payment id. The index is a hint
/// only: the provider's live status stays the source of truth for "paid".
/// Entries older than the horizon (default 300s) read as absent and are swept
/// on every access.
pub struct PendingPaymentIndex {
    entries: RwLock<HashMap<String, IndexEntry>>,
    horizon: Duration,
}

impl PendingPaymentIndex {
    pub fn new() -> Self {
        Self::with_horizon(Duration::from_secs(300))
    }

    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            horizon,
        }
    }

    fn key(provider: &str, payment_id: &str) -> String {
        format!("{provider}:{payment_id}")
    }

    pub async fn store_pending(
        &self,
        operation_name: &str,
        provider: &str,
        payment_id: &str,
        payment_url: &str,
        client_id: Option<&str>,
    ) {
        let mut entries = self.entries.write().await;
        Self::sweep(&mut entries, self.horizon);
        entries.insert(
            Self::key(provider, payment_id),
            IndexEntry {
                operation_name: operation_name.to_string(),
                payment_url: payment_url.to_string(),
                created_at: Instant::now(),
                client_id: client_id.map(str::to_string),
            },
        );
        tracing::debug!(provider, payment_id, operation_name, "stored pending payment");
    }

    /// Looks up one pending payment by its exact id.
    ///
    /// Returns `(operation_name, payment_url)`; absent, expired or (in strict
    /// mode) client-mismatched entries read as `None`.
    pub async fn get_pending_by_id(
        &self,
        provider: &str,
        payment_id: &str,
        client_id: Option<&str>,
        strict: bool,
    ) -> Option<(String, String)> {
        let mut entries = self.entries.write().await;
        Self::sweep(&mut entries, self.horizon);
        let entry = entries.get(&Self::key(provider, payment_id))?;
        if strict && entry.client_id.as_deref() != client_id {
            tracing::debug!(provider, payment_id, "pending payment found but client mismatch");
            return None;
        }
        Some((entry.operation_name.clone(), entry.payment_url.clone()))
    }

    /// Newest non-expired pending payment for an operation.
    ///
    /// Used when a caller retries without a payment id. Returns
    /// `(payment_id, payment_url)`.
    pub async fn get_most_recent_pending_for_operation(
        &self,
        operation_name: &str,
        provider: &str,
        client_id: Option<&str>,
        strict: bool,
    ) -> Option<(String, String)> {
        let prefix = format!("{provider}:");
        let mut entries = self.entries.write().await;
        Self::sweep(&mut entries, self.horizon);

        entries
            .iter()
            .filter(|(key, entry)| {
                key.starts_with(&prefix)
                    && entry.operation_name == operation_name
                    && (!strict || entry.client_id.as_deref() == client_id)
            })
            .max_by_key(|(_, entry)| entry.created_at)
            .map(|(key, entry)| {
                let payment_id = key[prefix.len()..].to_string();
                (payment_id, entry.payment_url.clone())
            })
    }

    /// Enumerates a client's live entries as `payment_id -> (operation_name,
    /// payment_url)`, optionally narrowed to one provider.
    pub async fn all_pending_for_client(
        &self,
        client_id: &str,
        provider: Option<&str>,
    ) -> HashMap<String, (String, String)> {
        let mut entries = self.entries.write().await;
        Self::sweep(&mut entries, self.horizon);

        entries
            .iter()
            .filter(|(key, entry)| {
                entry.client_id.as_deref() == Some(client_id)
                    && provider.is_none_or(|p| key.starts_with(&format!("{p}:")))
            })
            .map(|(key, entry)| {
                let payment_id = key.split_once(':').map(|(_, id)| id).unwrap_or(key);
                (
                    payment_id.to_string(),
                    (entry.operation_name.clone(), entry.payment_url.clone()),
                )
            })
            .collect()
    }

    /// Drops an entry on terminal resolution (paid, canceled, expired).
    pub async fn clear_pending(&self, provider: &str, payment_id: &str) {
        let removed = self
            .entries
            .write()
            .await
            .remove(&Self::key(provider, payment_id));
        if removed.is_some() {
            tracing::debug!(provider, payment_id, "cleared pending payment");
        }
    }

    fn sweep(entries: &mut HashMap<String, IndexEntry>, horizon: Duration) {
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.created_at) < horizon);
    }
}

impl Default for PendingPaymentIndex {
    fn default() -> Self {
        Self::new()
    }
}
