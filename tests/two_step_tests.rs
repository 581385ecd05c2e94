mod common;

use common::{EchoOperation, ScriptedProvider, init_tracing};
use paygate::application::response::FlowResponse;
use paygate::application::two_step::TwoStepFlow;
use paygate::domain::context::CallContext;
use paygate::domain::payment::{PaymentStatus, Price};
use paygate::domain::ports::StateStore;
use paygate::error::FlowError;
use paygate::infrastructure::in_memory::InMemoryStateStore;
use paygate::infrastructure::locks::PaymentLocks;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    flow: Arc<TwoStepFlow>,
    provider: Arc<ScriptedProvider>,
    operation: Arc<EchoOperation>,
    state: Arc<InMemoryStateStore>,
}

fn harness() -> Harness {
    init_tracing();
    let provider = Arc::new(ScriptedProvider::new());
    let operation = Arc::new(EchoOperation::new());
    let state = Arc::new(InMemoryStateStore::new());
    let flow = Arc::new(TwoStepFlow::new(
        "report",
        operation.clone(),
        provider.clone(),
        Price::new(dec!(10), "USD"),
        state.clone(),
        Arc::new(PaymentLocks::new()),
    ));
    Harness {
        flow,
        provider,
        operation,
        state,
    }
}

#[tokio::test]
async fn test_initiate_returns_payment_details() {
    let h = harness();
    let ctx = CallContext::new();

    let response = h.flow.initiate(json!({"q": 1}), &ctx).await.unwrap();
    let FlowResponse::Pending(pending) = response else {
        panic!("expected pending response");
    };
    assert_eq!(pending.payment_id.as_deref(), Some("p1"));
    assert_eq!(pending.payment_url, "https://pay.example/p1");
    assert_eq!(pending.next_step.as_deref(), Some("confirm_report_payment"));
    assert!(pending.message.contains("10 USD"));

    // Args are captured at initiation, before any payment arrives.
    let record = h.state.get("mockpay:p1").await.unwrap().unwrap();
    assert_eq!(record.captured_args, json!({"q": 1}));
    assert_eq!(h.operation.call_count(), 0);
}

#[tokio::test]
async fn test_confirm_executes_with_stored_args() {
    let h = harness();
    let ctx = CallContext::new();

    h.flow.initiate(json!({"q": 7}), &ctx).await.unwrap();
    h.provider.set_status("p1", PaymentStatus::Paid);

    let result = h.flow.confirm("p1", &ctx).await.unwrap();
    assert_eq!(result["args"], json!({"q": 7}));
    assert_eq!(h.operation.call_count(), 1);
    assert!(h.state.get("mockpay:p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_confirm_unpaid_retains_state_for_retry() {
    let h = harness();
    let ctx = CallContext::new();

    h.flow.initiate(json!({"q": 1}), &ctx).await.unwrap();

    let err = h.flow.confirm("p1", &ctx).await.unwrap_err();
    match err {
        FlowError::PaymentNotConfirmed { payment_id, status } => {
            assert_eq!(payment_id, "p1");
            assert_eq!(status, PaymentStatus::Pending);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.operation.call_count(), 0);
    assert!(h.state.get("mockpay:p1").await.unwrap().is_some());

    // Same confirmation succeeds once the provider reports paid.
    h.provider.set_status("p1", PaymentStatus::Paid);
    h.flow.confirm("p1", &ctx).await.unwrap();
    assert_eq!(h.operation.call_count(), 1);
}

#[tokio::test]
async fn test_confirm_terminal_payment_clears_state() {
    let h = harness();
    let ctx = CallContext::new();

    h.flow.initiate(json!({"q": 1}), &ctx).await.unwrap();
    h.provider.set_status("p1", PaymentStatus::Canceled);

    let err = h.flow.confirm("p1", &ctx).await.unwrap_err();
    assert_eq!(err.code(), "payment_terminal");
    assert!(h.state.get("mockpay:p1").await.unwrap().is_none());
    assert_eq!(h.operation.call_count(), 0);
}

#[tokio::test]
async fn test_confirm_unknown_payment() {
    let h = harness();
    let err = h
        .flow
        .confirm("p-bogus", &CallContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unknown_payment_id");
}

#[tokio::test]
async fn test_concurrent_confirms_execute_once() {
    let h = harness();
    let ctx = CallContext::new();

    h.flow.initiate(json!({"q": 1}), &ctx).await.unwrap();
    h.provider.set_status("p1", PaymentStatus::Paid);

    let a = tokio::spawn({
        let flow = h.flow.clone();
        let ctx = ctx.clone();
        async move { flow.confirm("p1", &ctx).await }
    });
    let b = tokio::spawn({
        let flow = h.flow.clone();
        let ctx = ctx.clone();
        async move { flow.confirm("p1", &ctx).await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loss = results.into_iter().find(Result::is_err).unwrap();
    assert_eq!(loss.unwrap_err().code(), "unknown_payment_id");
    assert_eq!(h.operation.call_count(), 1);
}

#[tokio::test]
async fn test_session_scoped_record() {
    let h = harness();
    let ctx = CallContext::new().with_session_id("sess-1");

    h.flow.initiate(json!({"q": 1}), &ctx).await.unwrap();
    let record = h.state.get("session:sess-1:p1").await.unwrap().unwrap();
    assert_eq!(record.owner_session_id.as_deref(), Some("sess-1"));

    h.provider.set_status("p1", PaymentStatus::Paid);
    h.flow.confirm("p1", &ctx).await.unwrap();
    assert!(h.state.get("session:sess-1:p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_initiate_propagates_provider_failure() {
    let h = harness();
    h.provider.fail_payment_creation(true);

    let err = h
        .flow
        .initiate(json!({}), &CallContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "provider_unavailable");
    assert_eq!(h.operation.call_count(), 0);
}
