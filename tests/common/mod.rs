#![allow(dead_code)]

use async_trait::async_trait;
use paygate::domain::payment::PaymentStatus;
use paygate::domain::ports::{
    CatalogNotifier, InteractiveChannel, OperationCatalog, OperationEntry, OperationHandle,
    OperationHandler, PaymentProvider, ProgressSink, PromptAction,
};
use paygate::error::{FlowError, Result};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

pub const PROVIDER_NAME: &str = "mockpay";

static TRACING: Once = Once::new();

/// Installs a fmt subscriber once per test binary; `RUST_LOG` filters.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Provider fake: hands out sequential payment ids and serves scripted
/// statuses. Unknown ids read as pending.
pub struct ScriptedProvider {
    next_id: AtomicU32,
    created: AtomicU32,
    statuses: Mutex<HashMap<String, PaymentStatus>>,
    pay_after: Mutex<HashMap<String, u32>>,
    fail_create: AtomicBool,
    status_failures: AtomicU32,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            created: AtomicU32::new(0),
            statuses: Mutex::new(HashMap::new()),
            pay_after: Mutex::new(HashMap::new()),
            fail_create: AtomicBool::new(false),
            status_failures: AtomicU32::new(0),
        }
    }

    pub fn set_status(&self, payment_id: &str, status: PaymentStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), status);
    }

    /// Flips the payment to paid on its nth status check.
    pub fn pay_after_status_checks(&self, payment_id: &str, checks: u32) {
        self.pay_after
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), checks);
    }

    pub fn created_payments(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn fail_status_checks(&self, fail: bool) {
        self.status_failures
            .store(if fail { u32::MAX } else { 0 }, Ordering::SeqCst);
    }

    /// Errors the next `count` status checks, then serves statuses normally.
    pub fn fail_next_status_checks(&self, count: u32) {
        self.status_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_payment_creation(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_payment(
        &self,
        _amount: Decimal,
        _currency: &str,
        _description: &str,
    ) -> Result<(String, String)> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(FlowError::ProviderUnavailable("create refused".into()));
        }
        let id = format!("p{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.created.fetch_add(1, Ordering::SeqCst);
        let url = format!("https://pay.example/{id}");
        Ok((id, url))
    }

    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentStatus> {
        let failures = self.status_failures.load(Ordering::SeqCst);
        if failures > 0 {
            if failures != u32::MAX {
                self.status_failures.store(failures - 1, Ordering::SeqCst);
            }
            return Err(FlowError::ProviderUnavailable("status refused".into()));
        }
        {
            let mut pay_after = self.pay_after.lock().unwrap();
            if let Some(remaining) = pay_after.get_mut(payment_id) {
                if *remaining <= 1 {
                    pay_after.remove(payment_id);
                    self.set_status(payment_id, PaymentStatus::Paid);
                } else {
                    *remaining -= 1;
                    return Ok(PaymentStatus::Pending);
                }
            }
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(payment_id)
            .copied()
            .unwrap_or(PaymentStatus::Pending))
    }
}

/// Operation fake: records every invocation and echoes its args back. An
/// optional delay holds the call open across an await point.
pub struct EchoOperation {
    calls: Mutex<Vec<Value>>,
    delay: Option<Duration>,
}

impl EchoOperation {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperationHandler for EchoOperation {
    async fn call(&self, args: Value) -> Result<Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(args.clone());
        Ok(json!({"ok": true, "args": args}))
    }
}

/// Operation fake that fails a configured number of times before succeeding.
pub struct FlakyOperation {
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyOperation {
    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationHandler for FlakyOperation {
    async fn call(&self, _args: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(FlowError::execution(std::io::Error::other("boom")));
        }
        Ok(json!({"ok": true}))
    }
}

/// Interactive channel fake answering prompts from a script; once the script
/// runs out it keeps answering with the final default.
pub struct ScriptedChannel {
    script: Mutex<VecDeque<PromptAction>>,
    default: PromptAction,
    prompts: AtomicU32,
}

impl ScriptedChannel {
    pub fn accepting() -> Self {
        Self::with_script(vec![], PromptAction::Accept)
    }

    pub fn with_script(script: Vec<PromptAction>, default: PromptAction) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            prompts: AtomicU32::new(0),
        }
    }

    pub fn prompt_count(&self) -> u32 {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractiveChannel for ScriptedChannel {
    async fn prompt(&self, _message: &str) -> Result<PromptAction> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default))
    }
}

/// Progress sink fake recording every update.
pub struct RecordingProgressSink {
    updates: Mutex<Vec<(String, u8)>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn updates(&self) -> Vec<(String, u8)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn report(&self, message: &str, percent: u8) {
        self.updates
            .lock()
            .unwrap()
            .push((message.to_string(), percent));
    }
}

/// Catalog-changed notifier fake counting signals.
pub struct RecordingNotifier {
    signals: AtomicU32,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            signals: AtomicU32::new(0),
        }
    }

    pub fn signal_count(&self) -> u32 {
        self.signals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogNotifier for RecordingNotifier {
    async fn catalog_changed(&self) {
        self.signals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Operation catalog fake backed by a plain vec.
pub struct InMemoryCatalog {
    entries: Mutex<Vec<OperationEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entries(entries: Vec<OperationEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e.name == name)
    }
}

#[async_trait]
impl OperationCatalog for InMemoryCatalog {
    async fn register(&self, entry: OperationEntry) -> Result<OperationHandle> {
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|e| e.name == entry.name) {
            return Err(FlowError::Catalog(format!(
                "operation '{}' already registered",
                entry.name
            )));
        }
        let handle = OperationHandle {
            name: entry.name.clone(),
        };
        entries.push(entry);
        Ok(handle)
    }

    async fn unregister(&self, name: &str) -> Result<()> {
        self.entries.lock().unwrap().retain(|e| e.name != name);
        Ok(())
    }

    async fn list(&self) -> Vec<OperationEntry> {
        self.entries.lock().unwrap().clone()
    }
}
