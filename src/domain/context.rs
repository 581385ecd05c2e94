use super::ports::{CatalogNotifier, InteractiveChannel, ProgressSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-call context threaded in by the host-integration layer.
///
/// Identity is an opaque session-id token; the core never inspects host
/// internals. Capabilities are resolved once at wiring time: a `None` handle
/// means the host does not offer that channel and the flows degrade
/// gracefully (log and continue) instead of failing.
#[derive(Clone, Default)]
pub struct CallContext {
    /// Transport-scoped connection identity, when the host exposes one.
    pub session_id: Option<String>,
    /// Stable client identity, used for strict pending-payment recovery.
    pub client_id: Option<String>,
    /// Interactive accept/cancel prompt.
    pub interaction: Option<Arc<dyn InteractiveChannel>>,
    /// Progress-emit primitive.
    pub progress: Option<Arc<dyn ProgressSink>>,
    /// Catalog-changed notification.
    pub catalog_events: Option<Arc<dyn CatalogNotifier>>,
    /// Soft cancel signal set by the host when the caller goes away.
    pub abort: Option<Arc<AtomicBool>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_interaction(mut self, channel: Arc<dyn InteractiveChannel>) -> Self {
        self.interaction = Some(channel);
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_catalog_events(mut self, notifier: Arc<dyn CatalogNotifier>) -> Self {
        self.catalog_events = Some(notifier);
        self
    }

    pub fn with_abort(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}
