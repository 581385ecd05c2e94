use super::response::fee_description;
use crate::domain::context::CallContext;
use crate::domain::payment::Price;
use crate::domain::pending::PendingOperation;
use crate::domain::ports::{OperationHandler, PaymentProvider, StateStore};
use crate::domain::session::SessionKey;
use crate::error::{FlowError, Result};
use crate::infrastructure::locks::PaymentLocks;
use serde_json::Value;
use std::sync::Arc;

/// Resubmit flow: one operation that accepts an optional payment id.
///
/// Without one, the call fails with a typed `payment_required` error carrying
/// the payment link, and the full arguments are stored durably under the
/// payment id. With one, the stored call is resumed once the provider reports
/// the payment paid. Execution and state clearing are ordered so that a crash
/// mid-execution leaves the stored args intact: at-least-once execution,
/// at-most-once state clearing.
pub struct ResubmitFlow {
    operation_name: String,
    operation: Arc<dyn OperationHandler>,
    provider: Arc<dyn PaymentProvider>,
    price: Price,
    state: Arc<dyn StateStore>,
    locks: Arc<PaymentLocks>,
}

impl ResubmitFlow {
    pub fn new(
        operation_name: impl Into<String>,
        operation: Arc<dyn OperationHandler>,
        provider: Arc<dyn PaymentProvider>,
        price: Price,
        state: Arc<dyn StateStore>,
        locks: Arc<PaymentLocks>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            operation,
            provider,
            price,
            state,
            locks,
        }
    }

    pub async fn call(
        &self,
        args: Value,
        payment_id: Option<&str>,
        ctx: &CallContext,
    ) -> Result<Value> {
        match payment_id {
            None => self.request_payment(args, ctx).await,
            Some(payment_id) => self.resume(payment_id).await,
        }
    }

    /// No payment id: create the payment, store the args, fail typed.
    async fn request_payment(&self, args: Value, ctx: &CallContext) -> Result<Value> {
        let (payment_id, payment_url) = self
            .provider
            .create_payment(
                self.price.amount,
                &self.price.currency,
                &fee_description(&self.operation_name),
            )
            .await?;
        tracing::debug!(operation = %self.operation_name, payment_id, "created payment, storing args for resubmit");

        // Provider-scoped key and no TTL: the resubmit may arrive from a
        // different connection, long after any session is gone.
        let key = SessionKey::provider_scoped(self.provider.name(), &payment_id).storage_key();
        let record = PendingOperation::new(
            &payment_id,
            self.provider.name(),
            &self.operation_name,
            args,
        )
        .with_client_id(ctx.client_id().map(str::to_string));
        self.state.set(&key, record, None).await?;

        Err(FlowError::PaymentRequired {
            retry_instructions: format!(
                "Complete the payment at {payment_url}, then call '{}' again with payment_id '{payment_id}'.",
                self.operation_name
            ),
            payment_id,
            payment_url,
        })
    }

    /// Payment id supplied: serialize on the payment, check the provider and
    /// run the stored call.
    async fn resume(&self, payment_id: &str) -> Result<Value> {
        let guard = self.locks.acquire(payment_id).await;

        let key = SessionKey::provider_scoped(self.provider.name(), payment_id).storage_key();
        let Some(record) = self.state.get(&key).await? else {
            return Err(FlowError::UnknownPayment(payment_id.to_string()));
        };

        let status = self.provider.get_payment_status(payment_id).await?;
        if status.is_terminal_failure() {
            // State is retained: the caller may request a fresh payment for
            // the same stored call.
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

        tracing::info!(payment_id, operation = %self.operation_name, "payment confirmed, executing stored call");
        let result = self.operation.call(record.captured_args).await?;
        // Only a successful execution clears the stored call.
        self.state.delete(&key).await?;
        drop(guard);
        self.locks.discard(payment_id);
        Ok(result)
    }
}
