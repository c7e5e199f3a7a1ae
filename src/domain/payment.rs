use crate::domain::sms::ParsedSmsResult;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Message reported when no confirmation SMS arrives inside the window.
pub const TIMEOUT_MESSAGE: &str = "Payment timeout — no confirmation received";
/// Message reported when an in-flight payment is cancelled by the caller.
pub const CANCELLED_MESSAGE: &str = "Payment cancelled";

/// Represents a positive payment amount with at most 2 fractional digits.
///
/// This is a wrapper around `rust_decimal::Decimal` so that an invalid amount
/// can never reach the dial encoder.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }
        let value = value.normalize();
        if value.scale() > 2 {
            return Err(PaymentError::InvalidRequest(format!(
                "Amount {value} has more than 2 fractional digits"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// A UPI virtual payment address (`name@bank`).
///
/// Rejects values that would break USSD menu framing (`*`, `#`) or that are
/// not address-shaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vpa(String);

impl Vpa {
    pub fn new(value: impl Into<String>) -> Result<Self, PaymentError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(PaymentError::InvalidRequest("VPA must not be empty".to_string()));
        }
        if !value.contains('@') {
            return Err(PaymentError::InvalidRequest(format!(
                "VPA '{value}' must contain '@'"
            )));
        }
        if value.chars().any(|c| c == '*' || c == '#' || c.is_whitespace()) {
            return Err(PaymentError::InvalidRequest(format!(
                "VPA '{value}' contains characters not allowed in a USSD string"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Vpa {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Vpa> for String {
    fn from(vpa: Vpa) -> Self {
        vpa.0
    }
}

impl fmt::Display for Vpa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A single payment attempt, from amount confirmation to its terminal status.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Opaque unique identifier, generated at creation.
    pub id: String,
    /// Recipient address.
    pub vpa: Vpa,
    pub amount: Amount,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Only moves `Pending -> Completed` or `Pending -> Failed`.
    pub status: PaymentStatus,
    /// Bank reference, set only on completion.
    pub transaction_ref: Option<String>,
}

impl PaymentRequest {
    pub fn new(vpa: Vpa, amount: Amount, description: Option<String>) -> Self {
        Self {
            id: format!("PAY_{}", Uuid::new_v4().simple()),
            vpa,
            amount,
            description,
            created_at: Utc::now(),
            status: PaymentStatus::Pending,
            transaction_ref: None,
        }
    }

    /// Builds a request from raw user input, validating address and amount.
    pub fn from_input(
        vpa: &str,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Self, PaymentError> {
        Ok(Self::new(Vpa::new(vpa)?, Amount::new(amount)?, description))
    }

    /// Checks that the request can still be paid.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.vpa.as_str().is_empty() {
            return Err(PaymentError::InvalidRequest("VPA must not be empty".to_string()));
        }
        if self.amount.value() <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }
        if self.status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidRequest(format!(
                "Payment {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Moves a pending request to its terminal status. Returns false if the
    /// request had already left `Pending`.
    pub fn settle(&mut self, result: &PaymentResult) -> bool {
        if self.status != PaymentStatus::Pending {
            return false;
        }
        if result.success {
            self.status = PaymentStatus::Completed;
            self.transaction_ref = result.transaction_ref.clone();
        } else {
            self.status = PaymentStatus::Failed;
        }
        true
    }
}

/// Terminal outcome of one payment attempt, delivered through a single channel
/// whether it succeeded, failed at the bank, failed to dial or timed out.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_ref: Option<String>,
    pub amount: Option<Decimal>,
    pub vpa: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PaymentResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_ref: None,
            amount: None,
            vpa: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn timeout() -> Self {
        Self::failure(TIMEOUT_MESSAGE)
    }

    pub fn cancelled() -> Self {
        Self::failure(CANCELLED_MESSAGE)
    }
}

impl From<ParsedSmsResult> for PaymentResult {
    fn from(parsed: ParsedSmsResult) -> Self {
        let message = if parsed.success {
            "Payment successful"
        } else {
            "Payment failed"
        };
        Self {
            success: parsed.success,
            transaction_ref: parsed.transaction_ref,
            amount: parsed.amount,
            vpa: parsed.vpa,
            message: message.to_string(),
            timestamp: parsed.timestamp,
        }
    }
}
