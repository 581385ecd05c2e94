use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of payment states the flows reason about.
///
/// Providers report vendor-specific strings; [`PaymentStatus::normalize`]
/// folds them into this set so flow logic never sees raw vendor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Canceled,
    Failed,
    Expired,
    Unknown,
}

impl PaymentStatus {
    /// Folds a raw vendor status string into the closed set.
    ///
    /// Recognized success synonyms map to `Paid`, recognized failure synonyms
    /// to `Canceled`. Exact `failed`/`expired`/`unknown` keep their own
    /// variant. Anything unrecognized reads as `Pending`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" | "complete" | "completed" | "succeeded" | "success" | "captured"
            | "confirmed" | "approved" => PaymentStatus::Paid,
            "canceled" | "cancelled" | "error" | "refused" | "rejected" | "voided" => {
                PaymentStatus::Canceled
            }
            "failed" => PaymentStatus::Failed,
            "expired" => PaymentStatus::Expired,
            "unknown" => PaymentStatus::Unknown,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }

    /// Canceled, failed and expired all terminate a payment attempt.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Canceled | PaymentStatus::Failed | PaymentStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price attached to a protected operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    pub currency: String,
}

impl Price {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
