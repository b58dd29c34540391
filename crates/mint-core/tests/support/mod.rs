//! In-process ledger that emulates the registry program for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use ledger_wire::{
    config_address, decode_transaction, firearm_address, instruction_discriminator,
    signature_to_string, DecodedTransaction, PayloadLayout, RegistryConfig, SYSTEM_PROGRAM_ID,
};
use mint_core::{
    CreditLedger, InventoryId, InventoryItem, InventoryStore, MemoryCreditLedger,
    MemoryInventory, MintConfig, MintOrchestrator, StoreError,
};
use parking_lot::Mutex;
use registry_client::{
    AccountData, ClientError, ClientOptions, Commitment, LatestBlockhash, LedgerRpc,
    RegistryClient, Rejection, SignatureStatus,
};

pub const PROGRAM_ID: [u8; 32] = [7u8; 32];
pub const CONFIG_TAG: [u8; 8] = *b"regcfg\0\0";
pub const DEALER: &str = "dealer-1";

/// Program error codes the fake reports.
pub const ACCOUNT_IN_USE: u32 = 0;
pub const INSTRUCTION_MISSING: u32 = 100;
pub const FALLBACK_NOT_FOUND: u32 = 101;
pub const DID_NOT_DESERIALIZE: u32 = 102;
pub const CONSTRAINT_HAS_ONE: u32 = 2001;
pub const CONSTRAINT_SEEDS: u32 = 2006;
pub const ACCOUNT_NOT_INITIALIZED: u32 = 3012;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Initialize,
    Mint,
}

struct LedgerState {
    accounts: HashMap<[u8; 32], Vec<u8>>,
    statuses: HashMap<String, SignatureStatus>,
    handlers: HashMap<[u8; 8], Handler>,
    block_height: u64,
    layout: PayloadLayout,
    drop_transactions: bool,
    reject_initialize: bool,
    stale_config_reads: usize,
    failing_status_reads: usize,
    submitted: Vec<DecodedTransaction>,
}

pub struct FakeLedger {
    state: Mutex<LedgerState>,
    calls: AtomicUsize,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        let handlers = HashMap::from([
            (instruction_discriminator("initialize"), Handler::Initialize),
            (instruction_discriminator("mint_firearm"), Handler::Mint),
        ]);
        Self {
            state: Mutex::new(LedgerState {
                accounts: HashMap::new(),
                statuses: HashMap::new(),
                handlers,
                block_height: 1_000,
                layout: PayloadLayout::WithAcquisitionDate,
                drop_transactions: false,
                reject_initialize: false,
                stale_config_reads: 0,
                failing_status_reads: 0,
                submitted: Vec::new(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Dispatch mints only under `name` (e.g. the legacy camelCase build).
    pub fn with_mint_handler(self, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.handlers.retain(|_, h| *h != Handler::Mint);
            state
                .handlers
                .insert(instruction_discriminator(name), Handler::Mint);
        }
        self
    }

    /// A program build that dispatches no mint handler at all.
    pub fn without_mint_handler(self) -> Self {
        self.state.lock().handlers.retain(|_, h| *h != Handler::Mint);
        self
    }

    pub fn with_layout(self, layout: PayloadLayout) -> Self {
        self.state.lock().layout = layout;
        self
    }

    /// Accept transactions at submission but never land them.
    pub fn dropping_transactions(self) -> Self {
        self.state.lock().drop_transactions = true;
        self
    }

    /// Refuse every initialize, as a node does when the payer cannot fund
    /// the config account.
    pub fn rejecting_initialize(self) -> Self {
        self.state.lock().reject_initialize = true;
        self
    }

    /// Fail the next `n` signature status reads with a transport error.
    pub fn with_failing_status_reads(self, n: usize) -> Self {
        self.state.lock().failing_status_reads = n;
        self
    }

    /// Report the config account as absent for the next `n` reads.
    pub fn with_stale_config_reads(self, n: usize) -> Self {
        self.state.lock().stale_config_reads = n;
        self
    }

    /// Create the registry config directly, as if another process had.
    pub fn with_config(self, authority: [u8; 32], next_id: u64) -> Self {
        if let Ok(address) = config_address(&PROGRAM_ID) {
            let data = RegistryConfig { authority, next_id }.encode(&CONFIG_TAG);
            self.state.lock().accounts.insert(address, data);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<DecodedTransaction> {
        self.state.lock().submitted.clone()
    }

    /// Discriminators of every submitted instruction, in order.
    pub fn submitted_discriminators(&self) -> Vec<[u8; 8]> {
        self.state
            .lock()
            .submitted
            .iter()
            .flat_map(|tx| tx.instructions().iter())
            .filter_map(|ix| ix.data.get(..8).and_then(|d| d.try_into().ok()))
            .collect()
    }

    pub fn account(&self, address: &[u8; 32]) -> Option<Vec<u8>> {
        self.state.lock().accounts.get(address).cloned()
    }

    pub fn registry_config(&self) -> Option<RegistryConfig> {
        let address = config_address(&PROGRAM_ID).ok()?;
        let data = self.account(&address)?;
        RegistryConfig::decode(&data).ok()
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().accounts.len()
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}

impl LedgerState {
    /// Apply every instruction or none.
    fn execute(&mut self, tx: &DecodedTransaction) -> Result<(), Rejection> {
        let mut accounts = self.accounts.clone();

        for ix in tx.instructions() {
            let program = tx.account_keys()[ix.program_id_index as usize];
            if program != PROGRAM_ID {
                return Err(Rejection::new("unsupported program"));
            }
            let keys: Vec<usize> = ix.account_indices.iter().map(|i| *i as usize).collect();
            let Some(disc) = ix.data.get(..8) else {
                return Err(Rejection::new("instruction missing").with_code(INSTRUCTION_MISSING));
            };
            let disc: [u8; 8] = disc.try_into().map_err(|_| Rejection::new("bad data"))?;

            match self.handlers.get(&disc) {
                Some(Handler::Initialize) if self.reject_initialize => {
                    return Err(Rejection::new("insufficient funds for rent")
                        .in_instruction(0, "InsufficientFundsForRent"))
                }
                Some(Handler::Initialize) => initialize(&mut accounts, tx, &keys)?,
                Some(Handler::Mint) => mint(&mut accounts, tx, &keys, &ix.data[8..], self.layout)?,
                None => {
                    return Err(Rejection::new("Fallback functions are not supported")
                        .with_code(FALLBACK_NOT_FOUND))
                }
            }
        }

        self.accounts = accounts;
        Ok(())
    }
}

fn initialize(
    accounts: &mut HashMap<[u8; 32], Vec<u8>>,
    tx: &DecodedTransaction,
    keys: &[usize],
) -> Result<(), Rejection> {
    let [config, authority, system] = keys else {
        return Err(Rejection::new("not enough account keys"));
    };
    let expected = config_address(&PROGRAM_ID).map_err(|e| Rejection::new(e.to_string()))?;
    if tx.account_keys()[*config] != expected || !tx.is_writable(*config) {
        return Err(Rejection::new("config seeds").with_code(CONSTRAINT_SEEDS));
    }
    if !tx.is_signer(*authority) || !tx.is_writable(*authority) {
        return Err(Rejection::new("authority must sign"));
    }
    if tx.account_keys()[*system] != SYSTEM_PROGRAM_ID {
        return Err(Rejection::new("system program expected"));
    }
    if accounts.contains_key(&expected) {
        return Err(Rejection::new("Allocate: account already in use").with_code(ACCOUNT_IN_USE));
    }

    let data = RegistryConfig {
        authority: tx.account_keys()[*authority],
        next_id: 0,
    }
    .encode(&CONFIG_TAG);
    accounts.insert(expected, data);
    Ok(())
}

fn mint(
    accounts: &mut HashMap<[u8; 32], Vec<u8>>,
    tx: &DecodedTransaction,
    keys: &[usize],
    args: &[u8],
    layout: PayloadLayout,
) -> Result<(), Rejection> {
    let [config, firearm, authority, system] = keys else {
        return Err(Rejection::new("not enough account keys"));
    };
    let config_key = tx.account_keys()[*config];
    let Some(config_data) = accounts.get(&config_key) else {
        return Err(Rejection::new("config not initialized").with_code(ACCOUNT_NOT_INITIALIZED));
    };
    let mut registry =
        RegistryConfig::decode(config_data).map_err(|e| Rejection::new(e.to_string()))?;

    if !tx.is_signer(*authority) || tx.account_keys()[*authority] != registry.authority {
        return Err(Rejection::new("authority mismatch").with_code(CONSTRAINT_HAS_ONE));
    }
    let expected = firearm_address(&PROGRAM_ID, registry.next_id)
        .map_err(|e| Rejection::new(e.to_string()))?;
    let firearm_key = tx.account_keys()[*firearm];
    if firearm_key != expected || tx.is_signer(*firearm) || !tx.is_writable(*firearm) {
        return Err(Rejection::new("firearm seeds").with_code(CONSTRAINT_SEEDS));
    }
    if tx.account_keys()[*system] != SYSTEM_PROGRAM_ID {
        return Err(Rejection::new("system program expected"));
    }
    if accounts.contains_key(&firearm_key) {
        return Err(Rejection::new("Allocate: account already in use").with_code(ACCOUNT_IN_USE));
    }
    if !args_match_layout(args, layout) {
        return Err(Rejection::new("failed to deserialize").with_code(DID_NOT_DESERIALIZE));
    }

    accounts.insert(firearm_key, args.to_vec());
    registry.next_id += 1;
    accounts.insert(config_key, registry.encode(&CONFIG_TAG));
    Ok(())
}

fn args_match_layout(args: &[u8], layout: PayloadLayout) -> bool {
    parse_mint_args(args, layout).is_some_and(|rest| rest.is_empty())
}

/// Walk `serial, make, model, caliber, [Option<i64>], owner_id`, returning
/// whatever is left over.
fn parse_mint_args(mut rest: &[u8], layout: PayloadLayout) -> Option<&[u8]> {
    for _ in 0..4 {
        take_string(&mut rest)?;
    }
    if layout == PayloadLayout::WithAcquisitionDate {
        rest = match rest.first()? {
            0 => &rest[1..],
            1 => rest.get(9..)?,
            _ => return None,
        };
    }
    take_string(&mut rest)?;
    Some(rest)
}

fn take_string<'a>(rest: &mut &'a [u8]) -> Option<&'a str> {
    let data: &'a [u8] = rest;
    let len = u32::from_le_bytes(data.get(..4)?.try_into().ok()?) as usize;
    let end = 4usize.checked_add(len)?;
    let body = data.get(4..end)?;
    *rest = &data[end..];
    std::str::from_utf8(body).ok()
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn get_account(
        &self,
        address: &[u8; 32],
        _commitment: Commitment,
    ) -> Result<Option<AccountData>, ClientError> {
        self.enter().await;
        let mut state = self.state.lock();
        if state.stale_config_reads > 0 && config_address(&PROGRAM_ID).ok() == Some(*address) {
            state.stale_config_reads -= 1;
            return Ok(None);
        }
        Ok(state.accounts.get(address).map(|data| AccountData {
            data: data.clone(),
            owner: PROGRAM_ID,
            lamports: 1_000_000,
        }))
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: Commitment,
    ) -> Result<LatestBlockhash, ClientError> {
        self.enter().await;
        let state = self.state.lock();
        let mut blockhash = [0u8; 32];
        blockhash[..8].copy_from_slice(&state.block_height.to_le_bytes());
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: state.block_height + 150,
        })
    }

    async fn send_transaction(
        &self,
        wire: &[u8],
        _preflight: Commitment,
    ) -> Result<String, ClientError> {
        self.enter().await;
        let tx = decode_transaction(wire)?;
        tx.verify_signatures()?;
        let signature = signature_to_string(&tx.signatures[0]);

        let mut state = self.state.lock();
        state.submitted.push(tx.clone());
        if state.drop_transactions {
            return Ok(signature);
        }

        state.execute(&tx).map_err(ClientError::Rejected)?;
        state.statuses.insert(
            signature.clone(),
            SignatureStatus {
                confirmation: Some(Commitment::Finalized),
                err: None,
            },
        );
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, ClientError> {
        self.enter().await;
        let mut state = self.state.lock();
        if state.failing_status_reads > 0 {
            state.failing_status_reads -= 1;
            return Err(ClientError::Transport("connection reset by peer".into()));
        }
        Ok(state.statuses.get(signature).cloned())
    }

    async fn get_block_height(&self, _commitment: Commitment) -> Result<u64, ClientError> {
        self.enter().await;
        let mut state = self.state.lock();
        let step = if state.drop_transactions { 200 } else { 1 };
        state.block_height += step;
        Ok(state.block_height)
    }
}

/// Inventory whose commit always fails.
pub struct FailingCommit(pub Arc<MemoryInventory>);

#[async_trait]
impl InventoryStore for FailingCommit {
    async fn get(&self, id: InventoryId) -> Result<Option<InventoryItem>, StoreError> {
        self.0.get(id).await
    }

    async fn set_minted(&self, _id: InventoryId, _signature: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("inventory database is read-only".into()))
    }
}

/// Credit ledger wrapper that can fail after or instead of the real call.
pub struct FlakyCredits {
    pub inner: Arc<MemoryCreditLedger>,
    /// Apply the reservation, then report a failure anyway.
    pub fail_after_reserve: bool,
    pub fail_refund: bool,
}

impl FlakyCredits {
    pub fn new(inner: Arc<MemoryCreditLedger>) -> Self {
        Self {
            inner,
            fail_after_reserve: false,
            fail_refund: false,
        }
    }
}

#[async_trait]
impl CreditLedger for FlakyCredits {
    async fn reserve(&self, dealer_id: &str, reference: &str) -> Result<bool, StoreError> {
        let reserved = self.inner.reserve(dealer_id, reference).await?;
        if self.fail_after_reserve {
            return Err(StoreError::Unavailable("credit ledger timed out".into()));
        }
        Ok(reserved)
    }

    async fn refund(&self, dealer_id: &str, reference: &str) -> Result<(), StoreError> {
        if self.fail_refund {
            return Err(StoreError::Unavailable("credit ledger is read-only".into()));
        }
        self.inner.refund(dealer_id, reference).await
    }
}

pub fn authority_key() -> Arc<SigningKey> {
    Arc::new(SigningKey::from_bytes(&[42u8; 32]))
}

pub fn client(ledger: Arc<FakeLedger>) -> RegistryClient<Arc<FakeLedger>> {
    RegistryClient::new(
        ledger,
        authority_key(),
        PROGRAM_ID,
        ClientOptions {
            commitment: Commitment::Confirmed,
            poll_interval: Duration::from_millis(1),
            max_poll_failures: 3,
        },
    )
}

pub fn item(id: InventoryId, dealer_id: &str) -> InventoryItem {
    InventoryItem {
        id,
        dealer_id: dealer_id.to_string(),
        serial: "SN1".into(),
        make: "Glock".into(),
        model: "19".into(),
        caliber: "9mm".into(),
        acquisition_date: None,
        minted: false,
        tx_signature: None,
    }
}

pub type TestOrchestrator =
    MintOrchestrator<Arc<FakeLedger>, Arc<MemoryInventory>, Arc<MemoryCreditLedger>>;

pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub inventory: Arc<MemoryInventory>,
    pub credits: Arc<MemoryCreditLedger>,
    pub orchestrator: TestOrchestrator,
}

pub fn harness(ledger: FakeLedger, config: MintConfig) -> Harness {
    let ledger = Arc::new(ledger);
    let inventory = Arc::new(MemoryInventory::new());
    let credits = Arc::new(MemoryCreditLedger::new());
    let orchestrator = MintOrchestrator::new(
        client(ledger.clone()),
        inventory.clone(),
        credits.clone(),
        config,
    );
    Harness {
        ledger,
        inventory,
        credits,
        orchestrator,
    }
}
