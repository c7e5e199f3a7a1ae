//! Stand-ins for the device collaborators, used by the CLI and in tests.

use crate::domain::ports::{SecureDisplay, Telephony};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Telephony that records what it was asked to dial instead of calling.
#[derive(Clone, Default)]
pub struct SimulatedTelephony {
    dialed: Arc<Mutex<Vec<String>>>,
    failure: Option<String>,
}

impl SimulatedTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dial attempt fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Dial strings that were placed successfully, in order.
    pub fn dialed(&self) -> Vec<String> {
        self.dialed
            .lock()
            .map(|dialed| dialed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Telephony for SimulatedTelephony {
    async fn dial(&self, dial_string: &str, sim_slot: Option<u8>) -> Result<()> {
        if let Some(reason) = &self.failure {
            return Err(PaymentError::DialFailure(reason.clone()));
        }
        info!(%dial_string, sim_slot = ?sim_slot, "simulated dial");
        let mut dialed = self
            .dialed
            .lock()
            .map_err(|_| PaymentError::DialFailure("dial log poisoned".to_string()))?;
        dialed.push(dial_string.to_string());
        Ok(())
    }
}

/// Secure display that only tracks whether it is held.
#[derive(Clone, Default)]
pub struct LoggingSecureDisplay {
    active: Arc<AtomicBool>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl LoggingSecureDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecureDisplay for LoggingSecureDisplay {
    async fn acquire(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        info!("secure display on");
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
        info!("secure display off");
        Ok(())
    }
}
