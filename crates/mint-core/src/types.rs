//! Request, receipt, and response shapes of the mint pipeline.

use std::fmt;

use ledger_wire::FirearmFields;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, MintError};

pub type InventoryId = i64;

/// The slice of an inventory record the mint pipeline reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryId,
    pub dealer_id: String,
    pub serial: String,
    pub make: String,
    pub model: String,
    pub caliber: String,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub acquisition_date: Option<i64>,
    #[serde(default)]
    pub minted: bool,
    #[serde(default)]
    pub tx_signature: Option<String>,
}

impl InventoryItem {
    /// On-chain record fields. The dealer id doubles as the owner identifier.
    pub fn firearm_fields(&self) -> FirearmFields {
        FirearmFields {
            serial: self.serial.clone(),
            make: self.make.clone(),
            model: self.model.clone(),
            caliber: self.caliber.clone(),
            acquisition_date: self.acquisition_date,
            owner_id: self.dealer_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub inventory_id: InventoryId,
    pub dealer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddresses {
    pub config: String,
    pub firearm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub tx_signature: String,
    pub derived_addresses: DerivedAddresses,
    pub allocated_id: u64,
}

/// Wire shape returned to the caller for every mint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_addresses: Option<DerivedAddresses>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MintResponse {
    pub fn success(receipt: MintReceipt) -> Self {
        Self {
            ok: true,
            tx_signature: Some(receipt.tx_signature),
            derived_addresses: Some(receipt.derived_addresses),
            allocated_id: Some(receipt.allocated_id),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(err: &MintError) -> Self {
        let message = match err {
            MintError::ConsistencyWarning { .. } => "minted on-chain but commit failed".to_string(),
            other => other.to_string(),
        };
        Self {
            ok: false,
            tx_signature: err.signature().map(str::to_owned),
            derived_addresses: None,
            allocated_id: None,
            error_kind: Some(err.kind()),
            message: Some(message),
        }
    }
}

impl From<Result<MintReceipt, MintError>> for MintResponse {
    fn from(result: Result<MintReceipt, MintError>) -> Self {
        match result {
            Ok(receipt) => MintResponse::success(receipt),
            Err(err) => MintResponse::failure(&err),
        }
    }
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MintStage {
    Validating,
    CreditReserved,
    ConfigEnsured,
    IdAllocated,
    TxSubmitted,
    TxConfirmed,
    Committed,
}

impl fmt::Display for MintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MintStage::Validating => "validating",
            MintStage::CreditReserved => "credit_reserved",
            MintStage::ConfigEnsured => "config_ensured",
            MintStage::IdAllocated => "id_allocated",
            MintStage::TxSubmitted => "tx_submitted",
            MintStage::TxConfirmed => "tx_confirmed",
            MintStage::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// In-flight state of one mint request. Never persisted.
#[derive(Debug, Clone)]
pub struct MintAttempt {
    pub inventory_id: InventoryId,
    pub dealer_id: String,
    /// Idempotency reference for the credit reservation.
    pub reference: String,
    pub stage: MintStage,
    pub allocated_id: Option<u64>,
    pub signature: Option<String>,
}

impl MintAttempt {
    pub fn new(request: &MintRequest) -> Self {
        Self {
            inventory_id: request.inventory_id,
            dealer_id: request.dealer_id.clone(),
            reference: format!("mint-{}-{}", request.inventory_id, uuid::Uuid::new_v4()),
            stage: MintStage::Validating,
            allocated_id: None,
            signature: None,
        }
    }

    pub fn advance(&mut self, stage: MintStage) {
        debug!(
            inventory_id = self.inventory_id,
            reference = %self.reference,
            from = %self.stage,
            to = %stage,
            "mint stage"
        );
        self.stage = stage;
    }

    pub fn has_reserved_credit(&self) -> bool {
        self.stage >= MintStage::CreditReserved
    }
}
