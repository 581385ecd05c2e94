use super::recovery::{
    PriorPayment, check_prior_payment, confirm_and_execute, execute_recovered, load_record,
};
use super::response::{FlowResponse, confirm_operation_name, fee_description, payment_prompt};
use crate::config::FlowConfig;
use crate::domain::context::CallContext;
use crate::domain::payment::{PaymentStatus, Price};
use crate::domain::pending::PendingOperation;
use crate::domain::ports::{OperationHandler, PaymentProvider, PromptAction, StateStore};
use crate::domain::session::SessionKey;
use crate::error::Result;
use crate::infrastructure::locks::PaymentLocks;
use crate::infrastructure::pending_index::PendingPaymentIndex;
use serde_json::Value;
use std::sync::Arc;

/// Elicitation flow: a bounded interactive loop that prompts the caller to
/// accept or cancel, checking the provider between prompts. Exhausting the
/// attempts leaves the pending state and index entry in place so a later bare
/// retry (or an explicit confirmation) can pick the payment back up.
pub struct ElicitationFlow {
    operation_name: String,
    operation: Arc<dyn OperationHandler>,
    provider: Arc<dyn PaymentProvider>,
    price: Price,
    state: Arc<dyn StateStore>,
    index: Arc<PendingPaymentIndex>,
    locks: Arc<PaymentLocks>,
    config: FlowConfig,
}

impl ElicitationFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operation_name: impl Into<String>,
        operation: Arc<dyn OperationHandler>,
        provider: Arc<dyn PaymentProvider>,
        price: Price,
        state: Arc<dyn StateStore>,
        index: Arc<PendingPaymentIndex>,
        locks: Arc<PaymentLocks>,
        config: FlowConfig,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            operation,
            provider,
            price,
            state,
            index,
            locks,
            config,
        }
    }

    pub fn confirm_operation_name(&self) -> String {
        confirm_operation_name(&self.operation_name)
    }

    /// Entry point. `payment_id` is an optional explicit retry id; without
    /// one, a recent pending payment for this operation is recovered from the
    /// index before any new payment is created.
    pub async fn call(
        &self,
        args: Value,
        payment_id: Option<&str>,
        ctx: &CallContext,
    ) -> Result<FlowResponse> {
        match check_prior_payment(
            &self.operation_name,
            self.provider.as_ref(),
            &self.index,
            payment_id,
            ctx,
            self.config.strict_client_match,
        )
        .await?
        {
            PriorPayment::Paid { payment_id } => {
                return self.execute_paid(args, &payment_id, ctx).await;
            }
            PriorPayment::Canceled { payment_id, status } => {
                self.cleanup(&payment_id, ctx).await?;
                return Ok(FlowResponse::canceled(format!(
                    "Previous payment was {status}"
                )));
            }
            PriorPayment::None => {}
        }

        // Fresh payment.
        let (payment_id, payment_url) = self
            .provider
            .create_payment(
                self.price.amount,
                &self.price.currency,
                &fee_description(&self.operation_name),
            )
            .await?;
        tracing::debug!(operation = %self.operation_name, payment_id, "created payment");

        self.index
            .store_pending(
                &self.operation_name,
                self.provider.name(),
                &payment_id,
                &payment_url,
                ctx.client_id(),
            )
            .await;

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
            args.clone(),
        )
        .with_client_id(ctx.client_id().map(str::to_string));
        if let Some(sid) = ctx.session_id() {
            record = record.with_owner_session(sid);
        }
        self.state
            .set(&key, record, Some(self.config.state_ttl))
            .await?;

        let message = payment_prompt(&payment_url, &self.price);
        self.prompt_loop(args, &payment_id, &payment_url, &message, ctx)
            .await
    }

    /// Explicit confirmation after the prompt loop returned pending.
    pub async fn confirm(&self, payment_id: &str, ctx: &CallContext) -> Result<Value> {
        tracing::info!(payment_id, operation = %self.operation_name, "confirming payment");
        confirm_and_execute(
            self.operation.as_ref(),
            self.provider.as_ref(),
            self.state.as_ref(),
            &self.locks,
            Some(&self.index),
            payment_id,
            ctx,
        )
        .await
    }

    async fn prompt_loop(
        &self,
        args: Value,
        payment_id: &str,
        payment_url: &str,
        message: &str,
        ctx: &CallContext,
    ) -> Result<FlowResponse> {
        // Payment may have been completed before the first prompt, e.g. on a
        // fast reconnect.
        match self.check_status(payment_id).await {
            PaymentStatus::Paid => return self.execute_paid(args, payment_id, ctx).await,
            status if status.is_terminal_failure() => {
                self.cleanup(payment_id, ctx).await?;
                return Ok(FlowResponse::canceled(format!("Payment {status}")));
            }
            _ => {}
        }

        let Some(channel) = ctx.interaction.clone() else {
            tracing::warn!(
                operation = %self.operation_name,
                "interactive channel unavailable, returning pending without prompting"
            );
            return Ok(self.pending_response(payment_url));
        };

        for attempt in 0..self.config.attempt_budget() {
            if ctx.is_aborted() {
                tracing::info!(payment_id, "caller aborted, leaving payment pending");
                return Ok(self.pending_response(payment_url));
            }

            tracing::debug!(payment_id, attempt, "prompting caller for payment confirmation");
            match channel.prompt(message).await? {
                PromptAction::Cancel => {
                    tracing::info!(payment_id, "payment canceled by caller");
                    self.cleanup(payment_id, ctx).await?;
                    return Ok(FlowResponse::canceled("Payment canceled by user"));
                }
                PromptAction::Accept => {}
            }

            match self.check_status(payment_id).await {
                PaymentStatus::Paid => return self.execute_paid(args, payment_id, ctx).await,
                status if status.is_terminal_failure() => {
                    self.cleanup(payment_id, ctx).await?;
                    return Ok(FlowResponse::canceled(format!("Payment {status}")));
                }
                _ => {}
            }
        }

        tracing::info!(payment_id, "payment not received after prompt attempts");
        Ok(self.pending_response(payment_url))
    }

    /// Attempts exhausted: state and index entry stay for a later retry. The
    /// payment id is deliberately not exposed; recovery goes through the
    /// index or the confirmation operation.
    fn pending_response(&self, payment_url: &str) -> FlowResponse {
        FlowResponse::pending(
            "We haven't received the payment yet. Retry this operation once you have paid.",
            payment_url,
            None,
            Some(self.confirm_operation_name()),
        )
    }

    async fn check_status(&self, payment_id: &str) -> PaymentStatus {
        match self.provider.get_payment_status(payment_id).await {
            Ok(status) => status,
            Err(err) => {
                // Transient provider failure reads as still-pending.
                tracing::warn!(payment_id, error = %err, "status check failed, treating as pending");
                PaymentStatus::Pending
            }
        }
    }

    /// Lock-serialized execution once the payment reads as paid; a concurrent
    /// retry that consumed it first surfaces as `UnknownPayment`.
    async fn execute_paid(
        &self,
        args: Value,
        payment_id: &str,
        ctx: &CallContext,
    ) -> Result<FlowResponse> {
        tracing::info!(payment_id, operation = %self.operation_name, "payment confirmed, executing");
        let result = execute_recovered(
            self.operation.as_ref(),
            self.provider.as_ref(),
            self.state.as_ref(),
            &self.locks,
            &self.index,
            payment_id,
            args,
            ctx,
        )
        .await?;
        Ok(FlowResponse::Completed(result))
    }

    async fn cleanup(&self, payment_id: &str, ctx: &CallContext) -> Result<()> {
        if let Some((key, _)) = load_record(
            self.state.as_ref(),
            self.provider.name(),
            payment_id,
            ctx.session_id(),
        )
        .await?
        {
            self.state.delete(&key).await?;
        }
        self.index
            .clear_pending(self.provider.name(), payment_id)
            .await;
        Ok(())
    }
}
