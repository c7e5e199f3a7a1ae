//! Application layer containing the payment-confirmation pipeline.
//!
//! The classifier and dial encoder are pure functions. The `PaymentCorrelator`
//! owns the one in-flight payment and its countdown, and the
//! `PaymentOrchestrator` drives a payment through dial, confirmation and
//! history.

pub mod classifier;
pub mod correlator;
pub mod dial;
pub mod orchestrator;
