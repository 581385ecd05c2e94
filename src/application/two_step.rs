use super::recovery::confirm_and_execute;
use super::response::{FlowResponse, confirm_operation_name, fee_description, payment_prompt};
use crate::domain::context::CallContext;
use crate::domain::payment::Price;
use crate::domain::pending::PendingOperation;
use crate::domain::ports::{OperationHandler, PaymentProvider, StateStore};
use crate::domain::session::SessionKey;
use crate::error::Result;
use crate::infrastructure::locks::PaymentLocks;
use serde_json::Value;
use std::sync::Arc;

/// Two-step flow: initiation hands the caller a payment link, a distinct
/// explicitly invoked confirmation step runs the operation once the provider
/// reports the payment paid. No polling; caller-driven only.
pub struct TwoStepFlow {
    operation_name: String,
    operation: Arc<dyn OperationHandler>,
    provider: Arc<dyn PaymentProvider>,
    price: Price,
    state: Arc<dyn StateStore>,
    locks: Arc<PaymentLocks>,
}

impl TwoStepFlow {
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

    /// Name of the confirmation operation callers invoke for step two.
    pub fn confirm_operation_name(&self) -> String {
        confirm_operation_name(&self.operation_name)
    }

    /// Step one: create the payment and persist the captured args.
    pub async fn initiate(&self, args: Value, ctx: &CallContext) -> Result<FlowResponse> {
        let (payment_id, payment_url) = self
            .provider
            .create_payment(
                self.price.amount,
                &self.price.currency,
                &fee_description(&self.operation_name),
            )
            .await?;
        tracing::debug!(
            operation = %self.operation_name,
            payment_id,
            "created payment for two-step initiation"
        );

        let key = SessionKey::new(
            self.provider.name(),
            &payment_id,
            ctx.session_id().map(str::to_string),
        )
        .storage_key();
        let mut record = PendingOperation::new(
            &payment_id,
            self.provider.name(),
            &self.operation_name,
            args,
        )
        .with_client_id(ctx.client_id().map(str::to_string));
        if let Some(sid) = ctx.session_id() {
            record = record.with_owner_session(sid);
        }
        self.state.set(&key, record, None).await?;

        Ok(FlowResponse::pending(
            payment_prompt(&payment_url, &self.price),
            payment_url,
            Some(payment_id),
            Some(self.confirm_operation_name()),
        ))
    }

    /// Step two: validate the payment and run the operation with the stored
    /// args. State survives a not-paid status or an execution failure, so the
    /// caller can retry.
    pub async fn confirm(&self, payment_id: &str, ctx: &CallContext) -> Result<Value> {
        tracing::info!(payment_id, operation = %self.operation_name, "confirming payment");
        confirm_and_execute(
            self.operation.as_ref(),
            self.provider.as_ref(),
            self.state.as_ref(),
            &self.locks,
            None,
            payment_id,
            ctx,
        )
        .await
    }
}
