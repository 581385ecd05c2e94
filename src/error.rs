use crate::domain::payment::PaymentStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors surfaced by the payment flows.
///
/// Every variant maps to a stable machine-readable code via [`FlowError::code`],
/// so remote callers can branch on failures without parsing messages.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The payment provider could not be reached or returned garbage.
    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No pending operation is stored for the given payment id.
    #[error("unknown or expired payment_id: {0}")]
    UnknownPayment(String),

    /// The provider has not (yet) reported the payment as paid.
    #[error("payment {payment_id} has status {status}, expected paid")]
    PaymentNotConfirmed {
        payment_id: String,
        status: PaymentStatus,
    },

    /// The payment reached a terminal failure state (canceled/failed/expired).
    #[error("payment {payment_id} is {status}")]
    PaymentTerminal {
        payment_id: String,
        status: PaymentStatus,
    },

    /// Raised by the resubmit flow when a call arrives without a payment id.
    #[error("payment required: complete the payment at {payment_url} and retry")]
    PaymentRequired {
        payment_id: String,
        payment_url: String,
        retry_instructions: String,
    },

    /// A state store operation failed.
    #[error("state store error: {0}")]
    Store(String),

    /// The operation catalog rejected a register/unregister request.
    #[error("operation catalog error: {0}")]
    Catalog(String),

    /// The interactive confirmation channel failed mid-prompt.
    #[error("interactive channel error: {0}")]
    Interaction(String),

    /// The wrapped operation itself failed. Propagated to the caller unmodified.
    #[error("operation execution failed: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FlowError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::ProviderUnavailable(_) => "provider_unavailable",
            FlowError::UnknownPayment(_) => "unknown_payment_id",
            FlowError::PaymentNotConfirmed { .. } => "payment_not_confirmed",
            FlowError::PaymentTerminal { .. } => "payment_terminal",
            FlowError::PaymentRequired { .. } => "payment_required",
            FlowError::Store(_) => "store_error",
            FlowError::Catalog(_) => "catalog_error",
            FlowError::Interaction(_) => "interaction_error",
            FlowError::Execution(_) => "execution_failed",
        }
    }

    /// Wraps an arbitrary operation failure.
    pub fn execution<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FlowError::Execution(Box::new(err))
    }
}
