use crate::application::correlator::PaymentCorrelator;
use crate::application::dial;
use crate::domain::payment::{PaymentRequest, PaymentResult, PaymentStatus};
use crate::domain::ports::{PaymentHistoryStoreBox, SecureDisplayBox, TelephonyBox};
use crate::error::{PaymentError, Result};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// How long a dialed payment waits for its confirmation SMS by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs one payment end to end: dial, wait for the bank's SMS, record the outcome.
///
/// Dial failures and timeouts come back as an unsuccessful [`PaymentResult`];
/// `Err` is reserved for requests that were rejected before anything happened
/// (invalid input, or another payment still in flight). Nothing is retried.
pub struct PaymentOrchestrator {
    telephony: TelephonyBox,
    secure_display: SecureDisplayBox,
    history: PaymentHistoryStoreBox,
    correlator: PaymentCorrelator,
    timeout: Duration,
    sim_slot: Option<u8>,
    /// Id of the payment currently inside `pay`, from validation to recording.
    active: Mutex<Option<String>>,
}

/// Holds the orchestrator's single payment slot; frees it on drop.
struct Reservation<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.slot.lock() {
            *active = None;
        }
    }
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `telephony` - Places the USSD call.
    /// * `secure_display` - Held for the duration of each payment.
    /// * `history` - Receives every payment that gets past validation.
    /// * `correlator` - Shared with whatever delivers incoming SMS.
    pub fn new(
        telephony: TelephonyBox,
        secure_display: SecureDisplayBox,
        history: PaymentHistoryStoreBox,
        correlator: PaymentCorrelator,
    ) -> Self {
        Self {
            telephony,
            secure_display,
            history,
            correlator,
            timeout: DEFAULT_TIMEOUT,
            sim_slot: None,
            active: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sim_slot(mut self, sim_slot: Option<u8>) -> Self {
        self.sim_slot = sim_slot;
        self
    }

    /// Handle for the SMS reception side.
    pub fn correlator(&self) -> &PaymentCorrelator {
        &self.correlator
    }

    pub fn history(&self) -> &PaymentHistoryStoreBox {
        &self.history
    }

    /// Abandons the payment in flight; its `pay` call returns a cancelled result.
    pub async fn cancel(&self) {
        self.correlator.reset().await;
    }

    pub async fn pay(&self, mut request: PaymentRequest) -> Result<PaymentResult> {
        request.validate()?;
        let _reservation = self.reserve(&request.id)?;
        if let Some(armed) = self.correlator.pending_request().await {
            return Err(PaymentError::PaymentInFlight(armed.id));
        }

        if let Err(e) = self.history.append(request.clone()).await {
            warn!(payment_id = %request.id, error = %e, "could not record pending payment");
        }
        if let Err(e) = self.secure_display.acquire().await {
            warn!(error = %e, "secure display unavailable, continuing");
        }

        let outcome = self.dial_and_wait(&request).await;

        if let Err(e) = self.secure_display.release().await {
            warn!(error = %e, "failed to release secure display");
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.record(&request.id, PaymentStatus::Failed, None).await;
                return Err(e);
            }
        };

        request.settle(&result);
        self.record(&request.id, request.status, request.transaction_ref.clone())
            .await;
        info!(
            payment_id = %request.id,
            status = %request.status,
            message = %result.message,
            "payment finished"
        );
        Ok(result)
    }

    /// Claims the payment slot for `id`, or names the payment that holds it.
    fn reserve(&self, id: &str) -> Result<Reservation<'_>> {
        let mut active = self.active.lock().map_err(|_| {
            PaymentError::InternalError(Box::new(std::io::Error::other(
                "payment slot lock poisoned",
            )))
        })?;
        if let Some(holder) = active.as_ref() {
            warn!(active = %holder, rejected = %id, "payment already in progress, rejecting");
            return Err(PaymentError::PaymentInFlight(holder.clone()));
        }
        *active = Some(id.to_string());
        Ok(Reservation { slot: &self.active })
    }

    async fn dial_and_wait(&self, request: &PaymentRequest) -> Result<PaymentResult> {
        let dial_string = dial::encode_request(request);
        info!(payment_id = %request.id, %dial_string, sim_slot = ?self.sim_slot, "dialing");

        if let Err(e) = self.telephony.dial(&dial_string, self.sim_slot).await {
            warn!(payment_id = %request.id, error = %e, "dial failed");
            return Ok(PaymentResult::failure(format!("Failed to dial USSD: {e}")));
        }

        let receiver = self.correlator.arm(request.clone(), self.timeout).await?;
        Ok(receiver.await.unwrap_or_else(|_| PaymentResult::cancelled()))
    }

    async fn record(&self, id: &str, status: PaymentStatus, transaction_ref: Option<String>) {
        match self.history.update_status(id, status, transaction_ref).await {
            Ok(true) => {}
            Ok(false) => warn!(payment_id = %id, "payment missing from history"),
            Err(e) => warn!(payment_id = %id, error = %e, "could not update payment history"),
        }
    }
}
