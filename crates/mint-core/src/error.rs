use std::fmt;

use ledger_wire::{discriminator_hex, instruction_discriminator, WireError};
use registry_client::{ClientError, Rejection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `errorKind` values reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    InsufficientResourceError,
    ChainUnavailableError,
    ChainRejectionError,
    ConsistencyWarning,
    StoreError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::InsufficientResourceError => "InsufficientResourceError",
            ErrorKind::ChainUnavailableError => "ChainUnavailableError",
            ErrorKind::ChainRejectionError => "ChainRejectionError",
            ErrorKind::ConsistencyWarning => "ConsistencyWarning",
            ErrorKind::StoreError => "StoreError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an inventory or credit collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One handler name the program refused to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRejection {
    pub handler: &'static str,
    pub rejection: Rejection,
}

impl fmt::Display for HandlerRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let disc = instruction_discriminator(self.handler);
        write!(
            f,
            "{} [{}]: {}",
            self.handler,
            discriminator_hex(&disc),
            self.rejection
        )
    }
}

fn join_rejections(attempts: &[HandlerRejection]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error("inventory item {0} not found")]
    NotFound(i64),

    #[error("inventory item {inventory_id} does not belong to dealer {dealer_id}")]
    Forbidden { inventory_id: i64, dealer_id: String },

    #[error("inventory item {0} is already minted")]
    AlreadyMinted(i64),

    #[error("a mint for inventory item {0} is already in progress")]
    MintInProgress(i64),

    #[error("mint payload could not be encoded: {0}")]
    InvalidPayload(#[from] WireError),

    #[error("dealer {0} has no mint credit left")]
    InsufficientCredit(String),

    #[error("ledger unavailable: {0}")]
    ChainUnavailable(ClientError),

    #[error("registry config account is missing after initialization")]
    RegistryMissing,

    #[error("ledger rejected the transaction: {0}")]
    ChainRejected(Rejection),

    #[error("registry program dispatched none of the mint handlers: {}", join_rejections(.attempts))]
    DiscriminatorMismatch { attempts: Vec<HandlerRejection> },

    #[error("mint transaction {signature} outcome unknown: {reason}")]
    OutcomeUnknown { signature: String, reason: String },

    #[error("minted on-chain but commit failed: {reason}")]
    ConsistencyWarning { signature: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MintError::NotFound(_)
            | MintError::Forbidden { .. }
            | MintError::AlreadyMinted(_)
            | MintError::MintInProgress(_)
            | MintError::InvalidPayload(_) => ErrorKind::ValidationError,
            MintError::InsufficientCredit(_) => ErrorKind::InsufficientResourceError,
            MintError::ChainUnavailable(_)
            | MintError::OutcomeUnknown { .. }
            | MintError::RegistryMissing => ErrorKind::ChainUnavailableError,
            MintError::ChainRejected(_) | MintError::DiscriminatorMismatch { .. } => {
                ErrorKind::ChainRejectionError
            }
            MintError::ConsistencyWarning { .. } => ErrorKind::ConsistencyWarning,
            MintError::Store(_) => ErrorKind::StoreError,
        }
    }

    /// Signature of a transaction that landed, or may have, despite the
    /// failure.
    pub fn signature(&self) -> Option<&str> {
        match self {
            MintError::ConsistencyWarning { signature, .. }
            | MintError::OutcomeUnknown { signature, .. } => Some(signature),
            MintError::ChainUnavailable(err) => err.pending_signature(),
            _ => None,
        }
    }
}

impl From<ClientError> for MintError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rejected(r) => MintError::ChainRejected(r),
            ClientError::Wire(w) => MintError::InvalidPayload(w),
            ClientError::Unresolved { signature, reason } => {
                MintError::OutcomeUnknown { signature, reason }
            }
            other => MintError::ChainUnavailable(other),
        }
    }
}
