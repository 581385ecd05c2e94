use crate::domain::payment::Price;
use serde::Serialize;
use serde_json::{Value, json};

/// Non-terminal payment payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingPayment {
    pub message: String,
    pub payment_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

/// What a flow call resolves to.
///
/// `Completed` carries the wrapped operation's own result; the other variants
/// are flow-level payloads. [`FlowResponse::into_value`] produces the wire
/// shape callers see.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResponse {
    Completed(Value),
    Pending(PendingPayment),
    Canceled { message: String },
}

impl FlowResponse {
    pub fn pending(
        message: impl Into<String>,
        payment_url: impl Into<String>,
        payment_id: Option<String>,
        next_step: Option<String>,
    ) -> Self {
        FlowResponse::Pending(PendingPayment {
            message: message.into(),
            payment_url: payment_url.into(),
            payment_id,
            next_step,
        })
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        FlowResponse::Canceled {
            message: message.into(),
        }
    }

    /// Serializes into the caller-facing payload.
    pub fn into_value(self) -> Value {
        match self {
            FlowResponse::Completed(value) => value,
            FlowResponse::Pending(pending) => {
                let mut value = serde_json::to_value(&pending).unwrap_or_default();
                value["status"] = json!("pending");
                value
            }
            FlowResponse::Canceled { message } => {
                json!({"status": "canceled", "message": message})
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FlowResponse::Pending(_))
    }
}

/// Caller-facing prompt pointing at the provider's payment page.
pub fn payment_prompt(payment_url: &str, price: &Price) -> String {
    format!("Please open {payment_url} to complete the payment of {price}.")
}

/// Description attached to payments created for an operation.
pub fn fee_description(operation_name: &str) -> String {
    format!("{operation_name}() execution fee")
}

/// Name of the companion confirmation operation for a wrapped operation.
pub fn confirm_operation_name(operation_name: &str) -> String {
    format!("confirm_{operation_name}_payment")
}
