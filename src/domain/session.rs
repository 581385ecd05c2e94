/// Composite identity of one pending payment in the state store.
///
/// Storage-key precedence: when the caller's transport exposes a session id,
/// the record is keyed `session:{session_id}:{payment_id}` so concurrent
/// clients cannot collide. Without one (stdio transports, degraded HTTP), the
/// key falls back to `{provider}:{payment_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub provider: String,
    pub payment_id: String,
    pub transport_session_id: Option<String>,
}

impl SessionKey {
    pub fn new(
        provider: impl Into<String>,
        payment_id: impl Into<String>,
        transport_session_id: Option<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            payment_id: payment_id.into(),
            transport_session_id,
        }
    }

    /// Provider-scoped key with no transport session.
    pub fn provider_scoped(provider: impl Into<String>, payment_id: impl Into<String>) -> Self {
        Self::new(provider, payment_id, None)
    }

    pub fn storage_key(&self) -> String {
        match &self.transport_session_id {
            Some(sid) => format!("session:{}:{}", sid, self.payment_id),
            None => format!("{}:{}", self.provider, self.payment_id),
        }
    }
}
