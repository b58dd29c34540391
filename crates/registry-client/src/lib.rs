//! Ledger node access for the firearm registry.
//!
//! [`LedgerRpc`] is the node capability (read account, blockhash, submit,
//! poll); [`HttpLedgerRpc`] implements it over JSON-RPC. [`RegistryClient`]
//! layers the custodial authority on top and owns the confirmation loop.

pub mod client;
pub mod error;
pub mod http;
pub mod rpc;
pub mod signer;

pub use client::{ClientOptions, PendingTransaction, RegistryClient};
pub use error::{
    ClientError, Rejection, ANCHOR_INSTRUCTION_FALLBACK_NOT_FOUND, ANCHOR_INSTRUCTION_MISSING,
};
pub use http::{HttpLedgerRpc, PREFLIGHT_FAILURE_CODE};
pub use rpc::{AccountData, Commitment, LatestBlockhash, LedgerRpc, SignatureStatus};
pub use signer::{keypair_from_json, keypair_to_json, load_keypair_file};
