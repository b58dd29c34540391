//! The ledger-node capability the registry client depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Rejection};

/// Commitment levels, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Raw contents of an on-chain account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    pub data: Vec<u8>,
    pub owner: [u8; 32],
    pub lamports: u64,
}

/// A recent blockhash and the last block height at which a transaction
/// referencing it can still land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

/// Status of a submitted transaction as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub confirmation: Option<Commitment>,
    pub err: Option<Rejection>,
}

/// Read/submit/poll operations against a ledger node.
///
/// Implementations must be stateless with respect to callers so one handle
/// can serve concurrent requests.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_account(
        &self,
        address: &[u8; 32],
        commitment: Commitment,
    ) -> Result<Option<AccountData>, ClientError>;

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, ClientError>;

    /// Submit a signed wire transaction. Returns the signature reported by
    /// the node.
    async fn send_transaction(
        &self,
        wire: &[u8],
        preflight: Commitment,
    ) -> Result<String, ClientError>;

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, ClientError>;

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, ClientError>;
}

#[async_trait]
impl<T: LedgerRpc + ?Sized> LedgerRpc for std::sync::Arc<T> {
    async fn get_account(
        &self,
        address: &[u8; 32],
        commitment: Commitment,
    ) -> Result<Option<AccountData>, ClientError> {
        (**self).get_account(address, commitment).await
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, ClientError> {
        (**self).get_latest_blockhash(commitment).await
    }

    async fn send_transaction(
        &self,
        wire: &[u8],
        preflight: Commitment,
    ) -> Result<String, ClientError> {
        (**self).send_transaction(wire, preflight).await
    }

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, ClientError> {
        (**self).get_signature_status(signature).await
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, ClientError> {
        (**self).get_block_height(commitment).await
    }
}
