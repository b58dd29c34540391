//! The mint pipeline.
//!
//! ```text
//! Validating -> CreditReserved -> ConfigEnsured -> IdAllocated
//!            -> TxSubmitted -> TxConfirmed -> Committed
//! ```
//!
//! Validation and credit failures leave no side effects. Any failure after
//! the credit is reserved refunds it by the same reference before the
//! original error is returned. If the chain write lands but the inventory
//! commit fails, the credit is refunded and the signature is surfaced as a
//! [`MintError::ConsistencyWarning`]. When confirmation polling gives up
//! without knowing whether the transaction landed, the credit stays reserved
//! and the signature is surfaced as [`MintError::OutcomeUnknown`].
//!
//! Only one mint per inventory item runs at a time in an orchestrator; a
//! second request for the same item fails with [`MintError::MintInProgress`].
//!
//! Id allocation reads `next_id` from the registry config and derives the
//! firearm address from it. Two writers reading the same counter collide at
//! submission; the optional allocation lock only serializes writers sharing
//! this orchestrator.

use std::collections::HashSet;

use ledger_wire::{
    build_initialize, build_mint, bytes_to_address, config_address, firearm_address, Instruction,
    RegistryAbi, RegistryConfig, REGISTRY_ABI_V1,
};
use parking_lot::Mutex as SyncMutex;
use registry_client::{ClientError, LedgerRpc, RegistryClient};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::collaborators::{CreditLedger, InventoryStore};
use crate::config::MintConfig;
use crate::error::{HandlerRejection, MintError};
use crate::types::{
    DerivedAddresses, InventoryId, InventoryItem, MintAttempt, MintReceipt, MintRequest,
    MintStage,
};

/// Addresses and signature of a confirmed mint transaction.
struct ChainWrite {
    signature: String,
    config: [u8; 32],
    firearm: [u8; 32],
    allocated_id: u64,
}

/// Claim on an inventory id for the lifetime of one mint.
struct InFlight<'a> {
    ids: &'a SyncMutex<HashSet<InventoryId>>,
    id: InventoryId,
}

impl<'a> InFlight<'a> {
    fn claim(ids: &'a SyncMutex<HashSet<InventoryId>>, id: InventoryId) -> Option<Self> {
        ids.lock().insert(id).then(|| Self { ids, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.id);
    }
}

pub struct MintOrchestrator<R, I, C> {
    client: RegistryClient<R>,
    inventory: I,
    credits: C,
    config: MintConfig,
    abi: RegistryAbi,
    allocation_lock: Option<Mutex<()>>,
    in_flight: SyncMutex<HashSet<InventoryId>>,
}

impl<R, I, C> MintOrchestrator<R, I, C>
where
    R: LedgerRpc,
    I: InventoryStore,
    C: CreditLedger,
{
    pub fn new(client: RegistryClient<R>, inventory: I, credits: C, config: MintConfig) -> Self {
        let allocation_lock = config.serialize_allocations.then(|| Mutex::new(()));
        Self {
            client,
            inventory,
            credits,
            config,
            abi: REGISTRY_ABI_V1,
            allocation_lock,
            in_flight: SyncMutex::new(HashSet::new()),
        }
    }

    pub fn client(&self) -> &RegistryClient<R> {
        &self.client
    }

    pub fn config(&self) -> &MintConfig {
        &self.config
    }

    /// Run the full pipeline for one inventory item.
    #[instrument(
        skip(self, request),
        fields(inventory_id = request.inventory_id, dealer_id = %request.dealer_id)
    )]
    pub async fn mint(&self, request: &MintRequest) -> Result<MintReceipt, MintError> {
        let _claim = InFlight::claim(&self.in_flight, request.inventory_id)
            .ok_or(MintError::MintInProgress(request.inventory_id))?;
        let mut attempt = MintAttempt::new(request);
        let item = self.validate(request).await?;

        match self.credits.reserve(&request.dealer_id, &attempt.reference).await {
            Ok(true) => attempt.advance(MintStage::CreditReserved),
            Ok(false) => {
                info!("no mint credit left");
                return Err(MintError::InsufficientCredit(request.dealer_id.clone()));
            }
            Err(err) => {
                // The reservation may have been applied before the failure.
                self.refund(&attempt).await;
                return Err(err.into());
            }
        }

        let write = match self.write_on_chain(&item, &mut attempt).await {
            Ok(write) => write,
            Err(err) => return Err(self.compensate(&attempt, err).await),
        };

        if let Err(err) = self.inventory.set_minted(item.id, &write.signature).await {
            error!(
                signature = %write.signature,
                reference = %attempt.reference,
                error = %err,
                "minted on-chain but inventory commit failed"
            );
            self.refund(&attempt).await;
            return Err(MintError::ConsistencyWarning {
                signature: write.signature,
                reason: err.to_string(),
            });
        }
        attempt.advance(MintStage::Committed);

        info!(signature = %write.signature, allocated_id = write.allocated_id, "firearm minted");
        Ok(MintReceipt {
            tx_signature: write.signature,
            derived_addresses: DerivedAddresses {
                config: bytes_to_address(&write.config),
                firearm: bytes_to_address(&write.firearm),
            },
            allocated_id: write.allocated_id,
        })
    }

    /// Undo the credit reservation for a failed chain write, unless the
    /// transaction may still land.
    async fn compensate(&self, attempt: &MintAttempt, err: MintError) -> MintError {
        if let MintError::OutcomeUnknown { signature, reason } = &err {
            error!(
                %signature,
                reference = %attempt.reference,
                dealer_id = %attempt.dealer_id,
                %reason,
                "mint outcome unknown, credit left reserved for reconciliation"
            );
            return err;
        }

        warn!(
            reference = %attempt.reference,
            stage = %attempt.stage,
            signature = attempt.signature.as_deref().unwrap_or("-"),
            allocated_id = ?attempt.allocated_id,
            error = %err,
            "mint failed after credit reservation"
        );
        if attempt.has_reserved_credit() {
            self.refund(attempt).await;
        }
        err
    }

    async fn validate(&self, request: &MintRequest) -> Result<InventoryItem, MintError> {
        let item = self
            .inventory
            .get(request.inventory_id)
            .await?
            .ok_or(MintError::NotFound(request.inventory_id))?;

        if item.dealer_id != request.dealer_id {
            return Err(MintError::Forbidden {
                inventory_id: request.inventory_id,
                dealer_id: request.dealer_id.clone(),
            });
        }
        if item.minted {
            return Err(MintError::AlreadyMinted(request.inventory_id));
        }
        Ok(item)
    }

    /// Steps 3 to 5: ensure the registry exists, allocate, submit, confirm.
    async fn write_on_chain(
        &self,
        item: &InventoryItem,
        attempt: &mut MintAttempt,
    ) -> Result<ChainWrite, MintError> {
        self.ensure_initialized().await?;
        let program_id = *self.client.program_id();
        let config = config_address(&program_id)?;
        attempt.advance(MintStage::ConfigEnsured);

        let _guard = match &self.allocation_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let registry = self
            .client
            .read_registry_config()
            .await?
            .ok_or(MintError::RegistryMissing)?;
        let authority = self.client.authority();
        if registry.authority != authority {
            warn!(
                registry_authority = %bytes_to_address(&registry.authority),
                signer = %bytes_to_address(&authority),
                "registry authority differs from the custodial signer"
            );
        }

        let allocated_id = registry.next_id;
        let firearm = firearm_address(&program_id, allocated_id)?;
        attempt.allocated_id = Some(allocated_id);
        attempt.advance(MintStage::IdAllocated);
        debug!(
            allocated_id,
            firearm = %bytes_to_address(&firearm),
            "allocated firearm id"
        );

        let fields = item.firearm_fields();
        let handlers = self
            .abi
            .mint_firearm
            .candidates(self.config.legacy_discriminator_fallback);
        let mut rejected: Vec<HandlerRejection> = Vec::with_capacity(handlers.len());

        for handler in handlers {
            if let Some(previous) = rejected.last() {
                warn!(
                    handler,
                    previous = previous.handler,
                    abi_version = self.abi.version,
                    "mint handler not dispatched, retrying with legacy handler name"
                );
            }

            let ix = build_mint(
                &program_id,
                &config,
                &firearm,
                &authority,
                &fields,
                self.config.payload_layout,
                handler,
            )?;

            match self.submit_and_confirm(&ix, attempt).await {
                Ok(signature) => {
                    return Ok(ChainWrite {
                        signature,
                        config,
                        firearm,
                        allocated_id,
                    })
                }
                Err(ClientError::Rejected(rejection)) if rejection.is_dispatch_failure() => {
                    rejected.push(HandlerRejection { handler, rejection });
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(MintError::DiscriminatorMismatch { attempts: rejected })
    }

    async fn submit_and_confirm(
        &self,
        ix: &Instruction,
        attempt: &mut MintAttempt,
    ) -> Result<String, ClientError> {
        let pending = self.client.submit(std::slice::from_ref(ix)).await?;
        attempt.signature = Some(pending.signature.clone());
        attempt.advance(MintStage::TxSubmitted);

        self.client.confirm(&pending).await?;
        attempt.advance(MintStage::TxConfirmed);
        Ok(pending.signature)
    }

    /// Create the registry config if it does not exist yet.
    ///
    /// Safe to call repeatedly and concurrently: if our initialize is
    /// rejected, the account is re-read and an existing config counts as
    /// success.
    #[instrument(skip(self))]
    pub async fn ensure_initialized(&self) -> Result<RegistryConfig, MintError> {
        if let Some(existing) = self.client.read_registry_config().await? {
            return Ok(existing);
        }

        let program_id = *self.client.program_id();
        let config = config_address(&program_id)?;
        let ix = build_initialize(
            &program_id,
            &self.client.authority(),
            &config,
            self.abi.initialize.canonical,
        );

        let rejection = match self.client.submit_and_confirm(&[ix]).await {
            Ok(signature) => {
                info!(%signature, config = %bytes_to_address(&config), "registry initialized");
                None
            }
            Err(ClientError::Rejected(rejection)) => {
                info!(%rejection, "initialize rejected, re-reading registry config");
                Some(rejection)
            }
            // No credit rides on an initialize, so an unknown outcome is plain
            // unavailability here.
            Err(err @ ClientError::Unresolved { .. }) => {
                return Err(MintError::ChainUnavailable(err))
            }
            Err(err) => return Err(err.into()),
        };

        match (self.client.read_registry_config().await?, rejection) {
            (Some(cfg), _) => Ok(cfg),
            (None, Some(rejection)) => Err(MintError::ChainRejected(rejection)),
            (None, None) => Err(MintError::RegistryMissing),
        }
    }

    /// Current registry config, without initializing it.
    pub async fn registry_config(&self) -> Result<Option<RegistryConfig>, MintError> {
        Ok(self.client.read_registry_config().await?)
    }

    pub fn config_address(&self) -> Result<[u8; 32], MintError> {
        Ok(config_address(self.client.program_id())?)
    }

    async fn refund(&self, attempt: &MintAttempt) {
        match self
            .credits
            .refund(&attempt.dealer_id, &attempt.reference)
            .await
        {
            Ok(()) => info!(reference = %attempt.reference, "credit refunded"),
            Err(err) => error!(
                reference = %attempt.reference,
                dealer_id = %attempt.dealer_id,
                error = %err,
                "credit refund failed"
            ),
        }
    }
}
