use super::recovery::{
    PriorPayment, check_prior_payment, confirm_and_execute, execute_recovered, load_record,
};
use super::response::{FlowResponse, confirm_operation_name, fee_description, payment_prompt};
use crate::config::FlowConfig;
use crate::domain::context::CallContext;
use crate::domain::payment::{PaymentStatus, Price};
use crate::domain::pending::PendingOperation;
use crate::domain::ports::{OperationHandler, PaymentProvider, StateStore};
use crate::domain::session::SessionKey;
use crate::error::Result;
use crate::infrastructure::locks::PaymentLocks;
use crate::infrastructure::pending_index::PendingPaymentIndex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Progress flow: holds the call open, polling the provider on a fixed
/// interval and emitting progress updates, up to a ceiling. Reaching the
/// ceiling is a soft timeout: state stays put and the caller confirms later.
pub struct ProgressFlow {
    operation_name: String,
    operation: Arc<dyn OperationHandler>,
    provider: Arc<dyn PaymentProvider>,
    price: Price,
    state: Arc<dyn StateStore>,
    index: Arc<PendingPaymentIndex>,
    locks: Arc<PaymentLocks>,
    config: FlowConfig,
}

impl ProgressFlow {
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

    /// Entry point, with the same recovery contract as the elicitation flow.
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
        self.state.set(&key, record, None).await?;

        self.report(ctx, &payment_prompt(&payment_url, &self.price), 0)
            .await;
        self.poll_loop(args, &payment_id, &payment_url, ctx).await
    }

    /// Explicit confirmation after a timeout response.
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

    async fn poll_loop(
        &self,
        args: Value,
        payment_id: &str,
        payment_url: &str,
        ctx: &CallContext,
    ) -> Result<FlowResponse> {
        let mut waited = Duration::ZERO;
        while waited < self.config.max_wait {
            if ctx.is_aborted() {
                tracing::info!(payment_id, "caller aborted, leaving payment pending");
                return Ok(self.pending_response(payment_id, payment_url));
            }

            tokio::time::sleep(self.config.poll_interval).await;
            waited += self.config.poll_interval;

            let status = match self.provider.get_payment_status(payment_id).await {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(payment_id, error = %err, "status poll failed, continuing");
                    continue;
                }
            };

            match status {
                PaymentStatus::Paid => {
                    self.report(ctx, "Payment received, generating result", 100)
                        .await;
                    return self.execute_paid(args, payment_id, ctx).await;
                }
                status if status.is_terminal_failure() => {
                    tracing::info!(payment_id, %status, "payment failed");
                    self.cleanup(payment_id, ctx).await?;
                    return Ok(FlowResponse::canceled(format!("Payment {status}")));
                }
                _ => {
                    let percent = (waited.as_secs() * 100 / self.config.max_wait.as_secs().max(1))
                        .min(99) as u8;
                    self.report(
                        ctx,
                        &format!("Waiting for payment ({}s elapsed)", waited.as_secs()),
                        percent,
                    )
                    .await;
                }
            }
        }

        tracing::info!(payment_id, "payment not received before ceiling");
        Ok(self.pending_response(payment_id, payment_url))
    }

    /// Ceiling reached: state is retained for the confirmation operation.
    fn pending_response(&self, payment_id: &str, payment_url: &str) -> FlowResponse {
        FlowResponse::pending(
            "Payment timeout reached; the operation will run once the payment completes.",
            payment_url,
            Some(payment_id.to_string()),
            Some(self.confirm_operation_name()),
        )
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

    async fn report(&self, ctx: &CallContext, message: &str, percent: u8) {
        // Progress is best-effort; a host without the capability just polls.
        if let Some(sink) = &ctx.progress {
            sink.report(message, percent).await;
        }
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
