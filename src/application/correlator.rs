use crate::application::classifier::RegexSmsClassifier;
use crate::domain::payment::{PaymentRequest, PaymentResult};
use crate::domain::ports::SmsClassifier;
use crate::domain::sms::ParsedSmsResult;
use crate::error::{PaymentError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Receives the outcome of one armed payment.
pub type ResultCallback = Box<dyn FnOnce(PaymentResult) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorState {
    Idle,
    Armed,
    Done,
}

struct ArmedSession {
    request: PaymentRequest,
    deadline: Instant,
    callback: ResultCallback,
    timer: JoinHandle<()>,
}

enum Session {
    Idle,
    Armed(ArmedSession),
    Done,
}

impl Session {
    /// Leaves `Armed` for `Done`, handing back the session. `None` in any other state.
    fn resolve(&mut self) -> Option<ArmedSession> {
        match std::mem::replace(self, Session::Done) {
            Session::Armed(session) => Some(session),
            other => {
                *self = other;
                None
            }
        }
    }
}

struct Inner {
    session: Session,
    /// Bumped on every arm and reset; an expiry only applies to its own generation.
    generation: u64,
}

/// Matches asynchronously arriving bank SMS to the single payment in flight.
///
/// The SMS path and the countdown race to resolve an armed session. Every
/// transition out of `Armed` happens under one lock and takes the callback out
/// of the state, so whichever path gets there first is the only one that can
/// report a result.
///
/// Cloning is cheap and yields a handle to the same session, so the SMS
/// receiver and the payment flow can each hold one.
#[derive(Clone)]
pub struct PaymentCorrelator {
    classifier: Arc<dyn SmsClassifier>,
    inner: Arc<Mutex<Inner>>,
    armed: Arc<Notify>,
}

impl PaymentCorrelator {
    pub fn new(classifier: Arc<dyn SmsClassifier>) -> Self {
        Self {
            classifier,
            inner: Arc::new(Mutex::new(Inner {
                session: Session::Idle,
                generation: 0,
            })),
            armed: Arc::new(Notify::new()),
        }
    }

    /// A correlator using the stock [`RegexSmsClassifier`] rules.
    pub fn with_default_rules() -> Result<Self> {
        Ok(Self::new(Arc::new(RegexSmsClassifier::new()?)))
    }

    /// Arms the correlator for `request` and returns a receiver for its outcome.
    ///
    /// The receiver errors only if the session is cancelled with [`reset`](Self::reset).
    pub async fn arm(
        &self,
        request: PaymentRequest,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<PaymentResult>> {
        let (tx, rx) = oneshot::channel();
        self.arm_with(request, timeout, move |result| {
            if tx.send(result).is_err() {
                debug!("payment result receiver dropped");
            }
        })
        .await?;
        Ok(rx)
    }

    /// Arms the correlator for `request`; `callback` runs exactly once with the
    /// outcome unless the session is reset first.
    ///
    /// Fails with [`PaymentError::PaymentInFlight`] while another request is armed;
    /// the armed request is left untouched.
    pub async fn arm_with<F>(
        &self,
        request: PaymentRequest,
        timeout: Duration,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(PaymentResult) + Send + 'static,
    {
        let mut inner = self.inner.lock().await;
        if let Session::Armed(armed) = &inner.session {
            warn!(
                armed = %armed.request.id,
                rejected = %request.id,
                "payment already armed, rejecting"
            );
            return Err(PaymentError::PaymentInFlight(armed.request.id.clone()));
        }

        inner.generation += 1;
        let generation = inner.generation;
        let deadline = Instant::now() + timeout;
        let timer = tokio::spawn({
            let correlator = self.clone();
            async move {
                sleep_until(deadline).await;
                correlator.expire(generation).await;
            }
        });

        info!(
            payment_id = %request.id,
            timeout = ?timeout,
            "awaiting confirmation sms"
        );
        inner.session = Session::Armed(ArmedSession {
            request,
            deadline,
            callback: Box::new(callback),
            timer,
        });
        self.armed.notify_waiters();
        Ok(())
    }

    /// Offers a received SMS body to the armed payment.
    ///
    /// Returns the parsed result when this message resolved the payment. SMS
    /// that arrive while nothing is armed, or that do not classify, are
    /// dropped and the session keeps waiting.
    pub async fn submit_sms_text(&self, text: &str) -> Option<ParsedSmsResult> {
        let (session, parsed) = {
            let mut inner = self.inner.lock().await;
            if !matches!(inner.session, Session::Armed(_)) {
                debug!("no payment armed, discarding sms");
                return None;
            }
            let parsed = self.classifier.classify(text)?;
            let session = inner.session.resolve()?;
            session.timer.abort();
            (session, parsed)
        };

        if let Some(amount) = parsed.amount
            && amount != session.request.amount.value()
        {
            warn!(
                payment_id = %session.request.id,
                expected = %session.request.amount,
                reported = %amount,
                "confirmation sms reports a different amount"
            );
        }
        info!(
            payment_id = %session.request.id,
            success = parsed.success,
            transaction_ref = parsed.transaction_ref.as_deref().unwrap_or("-"),
            "payment resolved by sms"
        );
        (session.callback)(PaymentResult::from(parsed.clone()));
        Some(parsed)
    }

    /// Completes once a payment is armed; immediately if one already is.
    pub async fn wait_armed(&self) {
        loop {
            let notified = self.armed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_armed().await {
                return;
            }
            notified.await;
        }
    }

    /// Returns to `Idle` from any state, cancelling the countdown and dropping
    /// the armed request and its callback. Safe to call repeatedly.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        if let Session::Armed(session) = std::mem::replace(&mut inner.session, Session::Idle) {
            session.timer.abort();
            info!(payment_id = %session.request.id, "armed payment cancelled");
        }
    }

    pub async fn state(&self) -> CorrelatorState {
        match self.inner.lock().await.session {
            Session::Idle => CorrelatorState::Idle,
            Session::Armed(_) => CorrelatorState::Armed,
            Session::Done => CorrelatorState::Done,
        }
    }

    pub async fn is_armed(&self) -> bool {
        self.state().await == CorrelatorState::Armed
    }

    /// The request currently awaiting confirmation.
    pub async fn pending_request(&self) -> Option<PaymentRequest> {
        match &self.inner.lock().await.session {
            Session::Armed(session) => Some(session.request.clone()),
            _ => None,
        }
    }

    /// When the armed payment will time out.
    pub async fn deadline(&self) -> Option<Instant> {
        match &self.inner.lock().await.session {
            Session::Armed(session) => Some(session.deadline),
            _ => None,
        }
    }

    async fn expire(&self, generation: u64) {
        let session = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            match inner.session.resolve() {
                Some(session) => session,
                None => return,
            }
        };
        warn!(payment_id = %session.request.id, "no confirmation sms before deadline");
        (session.callback)(PaymentResult::timeout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex as StdMutex;

    const SUCCESS_SMS: &str = "Rs.500 debited. UPI Txn successful. UPI Ref No 1234567890AB";
    const WINDOW: Duration = Duration::from_secs(60);

    fn request() -> PaymentRequest {
        PaymentRequest::from_input("merchant@upi", dec!(500), None).unwrap()
    }

    fn recorder() -> (Arc<StdMutex<Vec<PaymentResult>>>, impl FnOnce(PaymentResult) + Send + 'static) {
        let results = Arc::new(StdMutex::new(Vec::new()));
        let sink = results.clone();
        (results, move |result| sink.lock().unwrap().push(result))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_after_window() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let started = Instant::now();
        let rx = correlator.arm(request(), WINDOW).await.unwrap();

        let result = rx.await.unwrap();
        assert!(started.elapsed() >= WINDOW);
        assert!(!result.success);
        assert!(result.message.contains("timeout"));
        assert_eq!(correlator.state().await, CorrelatorState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sms_resolves_once_and_cancels_timer() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let (results, callback) = recorder();
        correlator.arm_with(request(), WINDOW, callback).await.unwrap();

        let parsed = correlator.submit_sms_text(SUCCESS_SMS).await;
        assert!(parsed.is_some());

        // Neither a late SMS nor the original deadline may report again.
        assert!(correlator.submit_sms_text(SUCCESS_SMS).await.is_none());
        tokio::time::sleep(WINDOW * 2).await;

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].transaction_ref.as_deref(), Some("1234567890AB"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_irrelevant_sms_keeps_waiting() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let (results, callback) = recorder();
        correlator.arm_with(request(), WINDOW, callback).await.unwrap();

        assert!(correlator.submit_sms_text("Your OTP is 445566").await.is_none());
        assert!(correlator
            .submit_sms_text("Get 10% cashback on your next UPI payment")
            .await
            .is_none());
        assert!(correlator.is_armed().await);

        tokio::time::sleep(WINDOW * 2).await;
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_arm_is_rejected() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let first = request();
        let first_id = first.id.clone();
        let _rx = correlator.arm(first, WINDOW).await.unwrap();

        let second = correlator.arm(request(), WINDOW).await;
        assert!(matches!(second, Err(PaymentError::PaymentInFlight(id)) if id == first_id));
        assert_eq!(correlator.pending_request().await.unwrap().id, first_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sms_without_armed_payment_is_ignored() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        assert!(correlator.submit_sms_text(SUCCESS_SMS).await.is_none());
        assert_eq!(correlator.state().await, CorrelatorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_silences_stale_paths() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let (results, callback) = recorder();
        correlator.arm_with(request(), WINDOW, callback).await.unwrap();

        correlator.reset().await;
        correlator.reset().await;
        assert_eq!(correlator.state().await, CorrelatorState::Idle);
        assert!(correlator.deadline().await.is_none());

        assert!(correlator.submit_sms_text(SUCCESS_SMS).await.is_none());
        tokio::time::sleep(WINDOW * 2).await;
        assert!(results.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_closes_receiver() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let rx = correlator.arm(request(), WINDOW).await.unwrap();
        correlator.reset().await;
        assert!(rx.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_resolution() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let rx = correlator.arm(request(), WINDOW).await.unwrap();
        correlator.submit_sms_text(SUCCESS_SMS).await.unwrap();
        assert!(rx.await.unwrap().success);

        let (results, callback) = recorder();
        correlator.arm_with(request(), WINDOW, callback).await.unwrap();
        tokio::time::sleep(WINDOW * 2).await;

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sms_and_deadline_race_reports_once() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let (results, callback) = recorder();
        let window = Duration::from_secs(1);
        correlator.arm_with(request(), window, callback).await.unwrap();

        tokio::time::sleep(window).await;
        let by_sms = correlator.submit_sms_text(SUCCESS_SMS).await.is_some();
        tokio::time::sleep(WINDOW).await;

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].success, by_sms);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_armed_wakes_on_arm() {
        let correlator = PaymentCorrelator::with_default_rules().unwrap();
        let waiter = tokio::spawn({
            let correlator = correlator.clone();
            async move { correlator.wait_armed().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        let _rx = correlator.arm(request(), WINDOW).await.unwrap();
        waiter.await.unwrap();

        // Already armed: returns straight away.
        correlator.wait_armed().await;
    }
}
