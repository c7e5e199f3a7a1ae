mod common;

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use ussdpay::application::correlator::{CorrelatorState, PaymentCorrelator};
use ussdpay::application::orchestrator::PaymentOrchestrator;
use ussdpay::domain::payment::{PaymentRequest, PaymentStatus, TIMEOUT_MESSAGE};
use ussdpay::domain::ports::{PaymentHistoryStore, PaymentHistoryStoreBox};
use ussdpay::domain::sms::IncomingSms;
use ussdpay::infrastructure::in_memory::InMemoryHistoryStore;
use ussdpay::infrastructure::simulated::{LoggingSecureDisplay, SimulatedTelephony};
use ussdpay::interfaces::csv::sms_reader::{SmsFeedReader, replay};
use ussdpay::interfaces::qr::QrPayload;

fn sms(delay_ms: u64, body: &str) -> IncomingSms {
    IncomingSms {
        delay_ms,
        sender: None,
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_history_store_as_trait_object() {
    let store: PaymentHistoryStoreBox = Box::new(InMemoryHistoryStore::new());
    let request = PaymentRequest::from_input("merchant@upi", dec!(75), None).unwrap();
    let id = request.id.clone();

    let handle = tokio::spawn(async move {
        store.append(request).await.unwrap();
        store
            .update_status(&id, PaymentStatus::Completed, Some("REF1234567".to_string()))
            .await
            .unwrap();
        store.get(&id).await.unwrap().unwrap()
    });

    let stored = handle.await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(stored.transaction_ref.as_deref(), Some("REF1234567"));
}

#[tokio::test(start_paused = true)]
async fn test_qr_to_completed_payment() {
    let history = InMemoryHistoryStore::new();
    let correlator = PaymentCorrelator::with_default_rules().unwrap();
    let orchestrator = PaymentOrchestrator::new(
        Box::new(SimulatedTelephony::new()),
        Box::new(LoggingSecureDisplay::new()),
        Box::new(history.clone()),
        correlator.clone(),
    )
    .with_timeout(Duration::from_secs(30));

    let request = QrPayload::parse("upi://pay?pa=merchant@upi&pn=Corner%20Store&am=500")
        .unwrap()
        .into_request(None)
        .unwrap();
    let id = request.id.clone();

    let feed = tokio::spawn(async move {
        replay(
            &correlator,
            vec![sms(500, "Your OTP is 445566"), sms(500, common::SUCCESS_SMS)],
        )
        .await
    });

    let result = orchestrator.pay(request).await.unwrap();
    assert!(feed.await.unwrap());
    assert!(result.success);
    assert_eq!(result.amount, Some(dec!(500)));
    assert_eq!(result.transaction_ref.as_deref(), Some("1234567890AB"));

    let stored = history.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(stored.description.as_deref(), Some("Corner Store"));
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_after_deadline_is_ignored() {
    let history = InMemoryHistoryStore::new();
    let correlator = PaymentCorrelator::with_default_rules().unwrap();
    let orchestrator = PaymentOrchestrator::new(
        Box::new(SimulatedTelephony::new()),
        Box::new(LoggingSecureDisplay::new()),
        Box::new(history.clone()),
        correlator.clone(),
    )
    .with_timeout(Duration::from_secs(5));

    let request = PaymentRequest::from_input("merchant@upi", dec!(500), None).unwrap();
    let id = request.id.clone();

    let feed = tokio::spawn(async move {
        replay(&correlator, vec![sms(6_000, common::SUCCESS_SMS)]).await
    });

    let result = orchestrator.pay(request).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.message, TIMEOUT_MESSAGE);
    assert!(!feed.await.unwrap());

    let stored = history.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_callback_fires_once_under_racing_messages() {
    let correlator = PaymentCorrelator::with_default_rules().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let request = PaymentRequest::from_input("merchant@upi", dec!(250), None).unwrap();

    correlator
        .arm_with(request, Duration::from_secs(60), {
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for body in [common::SUCCESS_SMS, common::FAILURE_SMS, common::SUCCESS_SMS] {
        let correlator = correlator.clone();
        handles.push(tokio::spawn(async move {
            correlator.submit_sms_text(body).await.is_some()
        }));
    }

    let mut resolved = 0;
    for handle in handles {
        if handle.await.unwrap() {
            resolved += 1;
        }
    }
    tokio::time::advance(Duration::from_secs(120)).await;

    assert_eq!(resolved, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(correlator.state().await, CorrelatorState::Done);
}

#[test]
fn test_feed_reader_skips_nothing_valid() {
    let feed = common::sms_feed(&[
        (0, "VM-OTPSRV", "Your OTP is 445566"),
        (120, "AD-HDFCBK", common::SUCCESS_SMS),
    ])
    .unwrap();

    let messages: Vec<IncomingSms> = SmsFeedReader::new(std::fs::File::open(feed.path()).unwrap())
        .messages()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].delay_ms, 120);
    assert_eq!(messages[1].body, common::SUCCESS_SMS);
}
