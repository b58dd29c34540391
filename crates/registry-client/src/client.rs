//! Registry client: signs with the custodial authority and drives the
//! submit/confirm lifecycle over a [`LedgerRpc`].

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use ledger_wire::{
    compile_message, config_address, sign_transaction, Instruction, RegistryConfig,
};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::rpc::{AccountData, Commitment, LatestBlockhash, LedgerRpc, SignatureStatus};

/// Tunables for confirmation polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub commitment: Commitment,
    pub poll_interval: Duration,
    /// Consecutive failed status or height reads tolerated while waiting for
    /// a submitted transaction.
    pub max_poll_failures: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            poll_interval: Duration::from_millis(500),
            max_poll_failures: 20,
        }
    }
}

/// A transaction accepted by the node but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub signature: String,
    pub last_valid_block_height: u64,
}

pub struct RegistryClient<R> {
    rpc: R,
    authority: Arc<SigningKey>,
    program_id: [u8; 32],
    options: ClientOptions,
}

impl<R: LedgerRpc> RegistryClient<R> {
    pub fn new(
        rpc: R,
        authority: Arc<SigningKey>,
        program_id: [u8; 32],
        options: ClientOptions,
    ) -> Self {
        Self {
            rpc,
            authority,
            program_id,
            options,
        }
    }

    /// Public key of the custodial authority (fee payer and signer).
    pub fn authority(&self) -> [u8; 32] {
        self.authority.verifying_key().to_bytes()
    }

    pub fn program_id(&self) -> &[u8; 32] {
        &self.program_id
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub async fn get_account(&self, address: &[u8; 32]) -> Result<Option<AccountData>, ClientError> {
        self.rpc.get_account(address, self.options.commitment).await
    }

    /// Read and decode the singleton registry config, if it exists.
    pub async fn read_registry_config(&self) -> Result<Option<RegistryConfig>, ClientError> {
        let address = config_address(&self.program_id)?;
        match self.get_account(&address).await? {
            Some(account) => Ok(Some(RegistryConfig::decode(&account.data)?)),
            None => Ok(None),
        }
    }

    pub async fn latest_blockhash(&self) -> Result<LatestBlockhash, ClientError> {
        self.rpc.get_latest_blockhash(self.options.commitment).await
    }

    /// Compile, sign, and send `instructions` with a fresh blockhash.
    pub async fn submit(
        &self,
        instructions: &[Instruction],
    ) -> Result<PendingTransaction, ClientError> {
        let latest = self.latest_blockhash().await?;
        let message = compile_message(instructions, &self.authority(), &latest.blockhash)?;
        let signed = sign_transaction(&message, &self.authority)?;
        let local_signature = signed.signature_string();

        let signature = self
            .rpc
            .send_transaction(&signed.wire, self.options.commitment)
            .await?;
        if signature != local_signature {
            warn!(
                %local_signature,
                %signature,
                "node returned a different signature than the one signed locally"
            );
        }
        debug!(%signature, "transaction submitted");

        Ok(PendingTransaction {
            signature,
            last_valid_block_height: latest.last_valid_block_height,
        })
    }

    /// Poll until `pending` reaches the configured commitment, fails, or its
    /// blockhash expires.
    ///
    /// Read failures while polling do not end the wait: the transaction is
    /// already on its way and may still land. Once more than
    /// `max_poll_failures` reads fail in a row the outcome is reported as
    /// [`ClientError::Unresolved`], carrying the signature.
    pub async fn confirm(&self, pending: &PendingTransaction) -> Result<(), ClientError> {
        let mut failures = 0u32;
        loop {
            match self.poll_once(pending).await {
                Ok(Some(done)) => return done,
                Ok(None) => failures = 0,
                Err(err) => {
                    failures += 1;
                    if failures > self.options.max_poll_failures {
                        return Err(ClientError::Unresolved {
                            signature: pending.signature.clone(),
                            reason: err.to_string(),
                        });
                    }
                    warn!(
                        signature = %pending.signature,
                        failures,
                        error = %err,
                        "confirmation poll failed, retrying"
                    );
                }
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// One status and height check. `Ok(None)` means keep waiting.
    async fn poll_once(
        &self,
        pending: &PendingTransaction,
    ) -> Result<Option<Result<(), ClientError>>, ClientError> {
        if let Some(done) = self.check_status(&pending.signature).await? {
            return Ok(Some(done));
        }

        let height = self.rpc.get_block_height(self.options.commitment).await?;
        if height <= pending.last_valid_block_height {
            return Ok(None);
        }

        // The transaction may have landed between the two reads.
        if let Some(done) = self.check_status(&pending.signature).await? {
            return Ok(Some(done));
        }
        Ok(Some(Err(ClientError::Expired {
            signature: pending.signature.clone(),
            last_valid_block_height: pending.last_valid_block_height,
        })))
    }

    pub async fn submit_and_confirm(
        &self,
        instructions: &[Instruction],
    ) -> Result<String, ClientError> {
        let pending = self.submit(instructions).await?;
        self.confirm(&pending).await?;
        Ok(pending.signature)
    }

    /// `Some` once the status is terminal for our commitment level.
    async fn check_status(
        &self,
        signature: &str,
    ) -> Result<Option<Result<(), ClientError>>, ClientError> {
        let status = self.rpc.get_signature_status(signature).await?;
        Ok(match status {
            Some(SignatureStatus { err: Some(r), .. }) => Some(Err(ClientError::Rejected(r))),
            Some(SignatureStatus {
                confirmation: Some(level),
                ..
            }) if level >= self.options.commitment => Some(Ok(())),
            _ => None,
        })
    }
}
