use super::payment::{PaymentRequest, PaymentStatus};
use super::sms::ParsedSmsResult;
use crate::error::Result;
use async_trait::async_trait;

/// Turns a raw SMS body into a payment outcome, or `None` when the message is
/// not a recognizable confirmation.
///
/// Implementations must never fail: a field that cannot be extracted is left
/// out of the result instead.
pub trait SmsClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Option<ParsedSmsResult>;
}

/// Places the USSD call on the device.
#[async_trait]
pub trait Telephony: Send + Sync {
    async fn dial(&self, dial_string: &str, sim_slot: Option<u8>) -> Result<()>;
}

/// Exclusive UI resource held while a payment is on screen (secure display
/// mode on the device).
#[async_trait]
pub trait SecureDisplay: Send + Sync {
    async fn acquire(&self) -> Result<()>;
    async fn release(&self) -> Result<()>;
}

/// Payment history, keyed by payment id.
#[async_trait]
pub trait PaymentHistoryStore: Send + Sync {
    async fn append(&self, payment: PaymentRequest) -> Result<()>;
    /// Returns false when no payment with `id` is stored.
    async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        transaction_ref: Option<String>,
    ) -> Result<bool>;
    async fn get(&self, id: &str) -> Result<Option<PaymentRequest>>;
    /// Newest first.
    async fn recent(&self) -> Result<Vec<PaymentRequest>>;
}

pub type TelephonyBox = Box<dyn Telephony>;
pub type SecureDisplayBox = Box<dyn SecureDisplay>;
pub type PaymentHistoryStoreBox = Box<dyn PaymentHistoryStore>;
