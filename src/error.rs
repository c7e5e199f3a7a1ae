use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("USSD dial failed: {0}")]
    DialFailure(String),
    #[error("Another payment is already in flight: {0}")]
    PaymentInFlight(String),
    #[error("Invalid QR payload: {0}")]
    InvalidQr(String),
    #[error("Invalid classifier pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
