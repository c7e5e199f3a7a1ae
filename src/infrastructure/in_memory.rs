use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::domain::ports::PaymentHistoryStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Number of payments kept when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// A thread-safe in-memory payment history, newest first.
///
/// Uses `Arc<RwLock<VecDeque<PaymentRequest>>>` so clones share the same
/// history. Once `limit` payments are stored, the oldest is evicted.
#[derive(Clone)]
pub struct InMemoryHistoryStore {
    payments: Arc<RwLock<VecDeque<PaymentRequest>>>,
    limit: usize,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl InMemoryHistoryStore {
    /// Creates a new, empty history holding up to 50 payments.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            payments: Arc::new(RwLock::new(VecDeque::new())),
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl PaymentHistoryStore for InMemoryHistoryStore {
    async fn append(&self, payment: PaymentRequest) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.retain(|p| p.id != payment.id);
        payments.push_front(payment);
        payments.truncate(self.limit);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        transaction_ref: Option<String>,
    ) -> Result<bool> {
        let mut payments = self.payments.write().await;
        match payments.iter_mut().find(|p| p.id == id) {
            Some(payment) => {
                payment.status = status;
                if transaction_ref.is_some() {
                    payment.transaction_ref = transaction_ref;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<PaymentRequest>> {
        let payments = self.payments.read().await;
        Ok(payments.iter().find(|p| p.id == id).cloned())
    }

    async fn recent(&self) -> Result<Vec<PaymentRequest>> {
        let payments = self.payments.read().await;
        Ok(payments.iter().cloned().collect())
    }
}
