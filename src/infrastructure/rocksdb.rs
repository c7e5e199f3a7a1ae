use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::domain::ports::PaymentHistoryStore;
use crate::error::{PaymentError, Result};
use crate::infrastructure::in_memory::DEFAULT_HISTORY_LIMIT;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing payment history, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent payment history backed by RocksDB.
///
/// Payments are stored as JSON under their id. Once more than `limit`
/// payments are stored, the oldest by creation time are deleted.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbHistoryStore {
    db: Arc<DB>,
    limit: usize,
}

impl RocksDbHistoryStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_limit(path, DEFAULT_HISTORY_LIMIT)
    }

    pub fn open_with_limit<P: AsRef<Path>>(path: P, limit: usize) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments])?;

        Ok(Self {
            db: Arc::new(db),
            limit: limit.max(1),
        })
    }

    fn payments_cf(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_PAYMENTS).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(
                "Payments column family not found",
            )))
        })
    }

    /// All stored payments, newest first.
    fn load_all(&self) -> Result<Vec<PaymentRequest>> {
        let cf = self.payments_cf()?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            payments.push(serde_json::from_slice::<PaymentRequest>(&value)?);
        }
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    fn put(&self, payment: &PaymentRequest) -> Result<()> {
        let cf = self.payments_cf()?;
        self.db
            .put_cf(cf, payment.id.as_bytes(), serde_json::to_vec(payment)?)?;
        Ok(())
    }
}

#[async_trait]
impl PaymentHistoryStore for RocksDbHistoryStore {
    async fn append(&self, payment: PaymentRequest) -> Result<()> {
        self.put(&payment)?;

        let cf = self.payments_cf()?;
        for stale in self.load_all()?.iter().skip(self.limit) {
            self.db.delete_cf(cf, stale.id.as_bytes())?;
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        transaction_ref: Option<String>,
    ) -> Result<bool> {
        let Some(mut payment) = self.get(id).await? else {
            return Ok(false);
        };
        payment.status = status;
        if transaction_ref.is_some() {
            payment.transaction_ref = transaction_ref;
        }
        self.put(&payment)?;
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<PaymentRequest>> {
        let cf = self.payments_cf()?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn recent(&self) -> Result<Vec<PaymentRequest>> {
        let mut payments = self.load_all()?;
        payments.truncate(self.limit);
        Ok(payments)
    }
}
