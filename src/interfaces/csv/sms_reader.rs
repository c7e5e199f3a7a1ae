use crate::application::correlator::PaymentCorrelator;
use crate::domain::sms::IncomingSms;
use crate::error::{PaymentError, Result};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Reads a recorded SMS feed from a CSV source.
///
/// Expected columns are `delay_ms, sender, body`. Whitespace is trimmed and
/// bodies may be quoted to carry commas or newlines.
pub struct SmsFeedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SmsFeedReader<R> {
    /// Creates a new `SmsFeedReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes messages.
    pub fn messages(self) -> impl Iterator<Item = Result<IncomingSms>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}

/// Delivers `messages` to `correlator` in order once a payment is armed,
/// waiting each message's delay first. Stops at the first message that
/// resolves the armed payment and returns whether one did.
pub async fn replay(correlator: &PaymentCorrelator, messages: Vec<IncomingSms>) -> bool {
    correlator.wait_armed().await;
    for sms in messages {
        tokio::time::sleep(Duration::from_millis(sms.delay_ms)).await;
        debug!(sender = sms.sender.as_deref().unwrap_or("unknown"), "sms received");
        if correlator.submit_sms_text(&sms.body).await.is_some() {
            return true;
        }
    }
    false
}
