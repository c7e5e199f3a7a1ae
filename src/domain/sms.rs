use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured reading of a bank confirmation SMS.
///
/// Produced by an [`SmsClassifier`](crate::domain::ports::SmsClassifier) and
/// consumed immediately by the correlator; never persisted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSmsResult {
    pub success: bool,
    pub amount: Option<Decimal>,
    /// 10 to 18 alphanumerics, uppercase.
    pub transaction_ref: Option<String>,
    pub vpa: Option<String>,
    /// Original text, kept for audit only.
    pub raw_message: String,
    pub timestamp: DateTime<Utc>,
}

/// An SMS as delivered by the reception collaborator.
///
/// The sender is carried for logging; classification only looks at the body.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct IncomingSms {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub sender: Option<String>,
    pub body: String,
}
