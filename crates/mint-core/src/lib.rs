//! Mint orchestration for the firearm registry.
//!
//! [`MintOrchestrator`] takes a `{ inventoryId, dealerId }` request through
//! validation, credit reservation, registry initialization, id allocation,
//! and the on-chain mint, refunding the credit on every failure path. The
//! inventory and credit collaborators are traits with in-memory and SQLite
//! implementations.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod sqlite;
pub mod types;

pub use collaborators::{CreditLedger, InventoryStore};
pub use config::{ConfigError, LedgerConfig, MintConfig, ResolvedLedger, ServiceConfig};
pub use error::{ErrorKind, HandlerRejection, MintError, StoreError};
pub use memory::{MemoryCreditLedger, MemoryInventory};
pub use orchestrator::MintOrchestrator;
pub use sqlite::SqliteStore;
pub use types::{
    DerivedAddresses, InventoryId, InventoryItem, MintAttempt, MintReceipt, MintRequest,
    MintResponse, MintStage,
};
