use super::response::{FlowResponse, fee_description, payment_prompt};
use super::visibility::VisibilityController;
use crate::domain::context::CallContext;
use crate::domain::payment::Price;
use crate::domain::pending::PendingOperation;
use crate::domain::ports::{
    OperationCatalog, OperationEntry, OperationHandler, PaymentProvider, StateStore,
};
use crate::domain::session::SessionKey;
use crate::error::{FlowError, Result};
use crate::infrastructure::locks::PaymentLocks;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

const CONFIRM_OPERATION_KEY: &str = "confirm_operation";

/// List-change flow: initiation hides the original operation for the caller's
/// session and registers a one-off confirmation operation in its place; the
/// host is signalled to refresh its catalog both times.
///
/// The raw handler lives in its own field and confirmation always calls that
/// field, so the wrapped entry point can never re-trigger payment creation.
pub struct ListChangeFlow {
    operation_name: String,
    operation: Arc<dyn OperationHandler>,
    provider: Arc<dyn PaymentProvider>,
    price: Price,
    state: Arc<dyn StateStore>,
    visibility: Arc<VisibilityController>,
    catalog: Arc<dyn OperationCatalog>,
    locks: Arc<PaymentLocks>,
}

impl ListChangeFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operation_name: impl Into<String>,
        operation: Arc<dyn OperationHandler>,
        provider: Arc<dyn PaymentProvider>,
        price: Price,
        state: Arc<dyn StateStore>,
        visibility: Arc<VisibilityController>,
        catalog: Arc<dyn OperationCatalog>,
        locks: Arc<PaymentLocks>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            operation,
            provider,
            price,
            state,
            visibility,
            catalog,
            locks,
        }
    }

    /// Confirmation operation name for one specific payment.
    pub fn confirm_operation_name(&self, payment_id: &str) -> String {
        format!("confirm_{}_{}", self.operation_name, payment_id)
    }

    pub async fn initiate(&self, args: Value, ctx: &CallContext) -> Result<FlowResponse> {
        let (payment_id, payment_url) = self
            .provider
            .create_payment(
                self.price.amount,
                &self.price.currency,
                &fee_description(&self.operation_name),
            )
            .await?;

        // Transport-scoped connection identity, or a fresh one when the host
        // exposes none.
        let session_id = ctx
            .session_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let confirm_name = self.confirm_operation_name(&payment_id);
        tracing::debug!(
            operation = %self.operation_name,
            payment_id,
            session_id,
            "created payment, swapping catalog entries"
        );

        let key = SessionKey::provider_scoped(self.provider.name(), &payment_id).storage_key();
        let record = PendingOperation::new(
            &payment_id,
            self.provider.name(),
            &self.operation_name,
            args,
        )
        .with_owner_session(&session_id)
        .with_client_id(ctx.client_id().map(str::to_string))
        .with_metadata(CONFIRM_OPERATION_KEY, json!(confirm_name.clone()));
        self.state.set(&key, record, None).await?;

        // Register before hiding: if registration fails the caller keeps the
        // original operation and nothing is left half-swapped.
        self.catalog
            .register(OperationEntry::new(
                &confirm_name,
                format!(
                    "Confirm payment {payment_id} and execute {}()",
                    self.operation_name
                ),
            ))
            .await?;
        self.visibility.hide(&session_id, &self.operation_name).await;
        self.visibility
            .claim_confirmation(&confirm_name, &session_id)
            .await;
        self.notify_catalog_changed(ctx).await;

        Ok(FlowResponse::pending(
            payment_prompt(&payment_url, &self.price),
            payment_url,
            Some(payment_id),
            Some(confirm_name),
        ))
    }

    pub async fn confirm(&self, payment_id: &str, ctx: &CallContext) -> Result<Value> {
        let guard = self.locks.acquire(payment_id).await;

        let key = SessionKey::provider_scoped(self.provider.name(), payment_id).storage_key();
        let Some(record) = self.state.get(&key).await? else {
            // Nothing changes on a miss: visibility and registration as-is.
            return Err(FlowError::UnknownPayment(payment_id.to_string()));
        };

        let status = self.provider.get_payment_status(payment_id).await?;
        if !status.is_paid() {
            // Operation stays hidden and the confirmation stays registered,
            // so the caller can retry after paying.
            return Err(FlowError::PaymentNotConfirmed {
                payment_id: payment_id.to_string(),
                status,
            });
        }

        let session_id = record.owner_session_id.clone().unwrap_or_default();
        let confirm_name = record
            .metadata
            .get(CONFIRM_OPERATION_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.confirm_operation_name(payment_id));

        tracing::info!(payment_id, operation = %self.operation_name, "payment confirmed, executing");
        match self.operation.call(record.captured_args).await {
            Ok(result) => {
                self.state.delete(&key).await?;
                if let Err(err) = self.catalog.unregister(&confirm_name).await {
                    tracing::warn!(confirm_name, error = %err, "failed to unregister confirmation operation");
                }
                self.visibility.release_confirmation(&confirm_name).await;
                self.visibility
                    .unhide(&session_id, &self.operation_name)
                    .await;
                self.notify_catalog_changed(ctx).await;
                drop(guard);
                self.locks.discard(payment_id);
                Ok(result)
            }
            Err(err) => {
                // Execution failed: restore visibility so the session is not
                // locked out, but keep state and the confirmation operation
                // so the payment can still be redeemed by a retry.
                self.visibility
                    .unhide(&session_id, &self.operation_name)
                    .await;
                self.notify_catalog_changed(ctx).await;
                Err(err)
            }
        }
    }

    async fn notify_catalog_changed(&self, ctx: &CallContext) {
        match &ctx.catalog_events {
            Some(notifier) => notifier.catalog_changed().await,
            None => {
                tracing::debug!("catalog notifier unavailable, skipping refresh signal");
            }
        }
    }
}
