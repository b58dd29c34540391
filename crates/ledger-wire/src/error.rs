use thiserror::Error;

/// Failure while encoding or decoding registry wire data.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("account data error: {0}")]
    AccountDataError(String),
}
