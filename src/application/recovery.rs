use crate::domain::context::CallContext;
use crate::domain::payment::PaymentStatus;
use crate::domain::pending::PendingOperation;
use crate::domain::ports::{OperationHandler, PaymentProvider, StateStore};
use crate::domain::session::SessionKey;
use crate::error::{FlowError, Result};
use crate::infrastructure::locks::PaymentLocks;
use crate::infrastructure::pending_index::PendingPaymentIndex;
use serde_json::Value;

/// Loads a pending record, trying the session-scoped key first and falling
/// back to `provider:payment_id`. Returns the key the record lives under so
/// callers can delete the right one after execution.
pub(crate) async fn load_record(
    state: &dyn StateStore,
    provider: &str,
    payment_id: &str,
    session_id: Option<&str>,
) -> Result<Option<(String, PendingOperation)>> {
    if let Some(sid) = session_id {
        let key = SessionKey::new(provider, payment_id, Some(sid.to_string())).storage_key();
        if let Some(record) = state.get(&key).await? {
            return Ok(Some((key, record)));
        }
    }
    let key = SessionKey::provider_scoped(provider, payment_id).storage_key();
    Ok(state.get(&key).await?.map(|record| (key, record)))
}

/// Outcome of probing for a payment a previous call left behind.
pub(crate) enum PriorPayment {
    /// No usable prior payment; create a fresh one.
    None,
    /// The prior payment is paid; execute without creating a new one.
    Paid { payment_id: String },
    /// The prior payment failed terminally.
    Canceled {
        payment_id: String,
        status: PaymentStatus,
    },
}

/// Re-entry check shared by the elicitation and progress flows.
///
/// Resolves a payment id from the caller (explicit) or from the pending
/// index (bare retry), then consults the provider. Only paid and
/// canceled-family statuses short-circuit; a stale or unreadable id is
/// treated as absent, never as an error.
pub(crate) async fn check_prior_payment(
    operation_name: &str,
    provider: &dyn PaymentProvider,
    index: &PendingPaymentIndex,
    explicit_payment_id: Option<&str>,
    ctx: &CallContext,
    strict: bool,
) -> Result<PriorPayment> {
    let payment_id = match explicit_payment_id {
        Some(id) => Some(id.to_string()),
        None => index
            .get_most_recent_pending_for_operation(
                operation_name,
                provider.name(),
                ctx.client_id(),
                strict,
            )
            .await
            .map(|(id, _)| id),
    };
    let Some(payment_id) = payment_id else {
        return Ok(PriorPayment::None);
    };

    let status = match provider.get_payment_status(&payment_id).await {
        Ok(status) => status,
        Err(err) => {
            tracing::warn!(payment_id, error = %err, "could not check prior payment, treating as absent");
            return Ok(PriorPayment::None);
        }
    };

    if status.is_paid() {
        tracing::info!(payment_id, operation_name, "prior payment already paid");
        return Ok(PriorPayment::Paid { payment_id });
    }
    if status.is_terminal_failure() {
        return Ok(PriorPayment::Canceled { payment_id, status });
    }
    Ok(PriorPayment::None)
}

/// Runs a recovered paid payment under the per-payment lock.
///
/// The record and the index entry are re-resolved after the lock is held: a
/// concurrent retry that already consumed the payment leaves neither behind,
/// and this task observes `UnknownPayment` instead of executing a second
/// time. The index entry is cleared before the awaited execution, so no
/// further bare retry can resolve this payment while the operation runs. The
/// stored args win when a record exists; otherwise the current call's args
/// are used.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn execute_recovered(
    operation: &dyn OperationHandler,
    provider: &dyn PaymentProvider,
    state: &dyn StateStore,
    locks: &PaymentLocks,
    index: &PendingPaymentIndex,
    payment_id: &str,
    fallback_args: Value,
    ctx: &CallContext,
) -> Result<Value> {
    let guard = locks.acquire(payment_id).await;

    let stored = load_record(state, provider.name(), payment_id, ctx.session_id()).await?;
    let indexed = index
        .get_pending_by_id(provider.name(), payment_id, ctx.client_id(), false)
        .await;
    if stored.is_none() && indexed.is_none() {
        return Err(FlowError::UnknownPayment(payment_id.to_string()));
    }
    index.clear_pending(provider.name(), payment_id).await;

    let (key, args) = match stored {
        Some((key, record)) => (Some(key), record.captured_args),
        None => (None, fallback_args),
    };
    let result = operation.call(args).await?;
    if let Some(key) = key {
        state.delete(&key).await?;
    }
    drop(guard);
    locks.discard(payment_id);
    Ok(result)
}

/// Confirmation step shared by the two-step, elicitation and progress flows.
///
/// Serializes through the per-payment lock, requires a stored record and a
/// live paid status, executes with the captured args and only then clears
/// state (and the index entry, when one exists). A concurrent loser observes
/// `UnknownPayment` after the winner's delete.
pub(crate) async fn confirm_and_execute(
    operation: &dyn OperationHandler,
    provider: &dyn PaymentProvider,
    state: &dyn StateStore,
    locks: &PaymentLocks,
    index: Option<&PendingPaymentIndex>,
    payment_id: &str,
    ctx: &CallContext,
) -> Result<Value> {
    let guard = locks.acquire(payment_id).await;

    let Some((key, record)) =
        load_record(state, provider.name(), payment_id, ctx.session_id()).await?
    else {
        return Err(FlowError::UnknownPayment(payment_id.to_string()));
    };

    let status = provider.get_payment_status(payment_id).await?;
    if status.is_terminal_failure() {
        // A dead payment cannot be retried through this path; drop the record
        // so the caller starts over.
        state.delete(&key).await?;
        if let Some(index) = index {
            index.clear_pending(provider.name(), payment_id).await;
        }
        drop(guard);
        locks.discard(payment_id);
        return Err(FlowError::PaymentTerminal {
            payment_id: payment_id.to_string(),
            status,
        });
    }
    if !status.is_paid() {
        return Err(FlowError::PaymentNotConfirmed {
            payment_id: payment_id.to_string(),
            status,
        });
    }

    let result = operation.call(record.captured_args).await?;
    state.delete(&key).await?;
    if let Some(index) = index {
        index.clear_pending(provider.name(), payment_id).await;
    }
    drop(guard);
    locks.discard(payment_id);
    Ok(result)
}
