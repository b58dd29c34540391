//! In-memory collaborators for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::collaborators::{CreditLedger, InventoryStore};
use crate::error::StoreError;
use crate::types::{InventoryId, InventoryItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reservation {
    Reserved,
    Refunded,
    Denied,
}

#[derive(Default)]
struct CreditState {
    balances: HashMap<String, u64>,
    reservations: HashMap<String, (String, Reservation)>,
}

#[derive(Default)]
pub struct MemoryCreditLedger {
    state: Mutex<CreditState>,
}

impl MemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(dealer_id: &str, credits: u64) -> Self {
        let ledger = Self::new();
        ledger.set_balance(dealer_id, credits);
        ledger
    }

    pub fn set_balance(&self, dealer_id: &str, credits: u64) {
        self.state
            .lock()
            .balances
            .insert(dealer_id.to_string(), credits);
    }

    pub fn balance(&self, dealer_id: &str) -> u64 {
        self.state
            .lock()
            .balances
            .get(dealer_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn reserve(&self, dealer_id: &str, reference: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        if let Some((_, prior)) = state.reservations.get(reference) {
            return Ok(*prior != Reservation::Denied);
        }

        let balance = state.balances.entry(dealer_id.to_string()).or_insert(0);
        let outcome = if *balance > 0 {
            *balance -= 1;
            Reservation::Reserved
        } else {
            Reservation::Denied
        };
        state
            .reservations
            .insert(reference.to_string(), (dealer_id.to_string(), outcome));
        Ok(outcome == Reservation::Reserved)
    }

    async fn refund(&self, dealer_id: &str, reference: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let Some((owner, status)) = state.reservations.get_mut(reference) else {
            return Ok(());
        };
        if owner.as_str() != dealer_id || *status != Reservation::Reserved {
            return Ok(());
        }
        *status = Reservation::Refunded;
        *state.balances.entry(dealer_id.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryInventory {
    items: Mutex<HashMap<InventoryId, InventoryItem>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: InventoryItem) {
        self.items.lock().insert(item.id, item);
    }

    pub fn snapshot(&self, id: InventoryId) -> Option<InventoryItem> {
        self.items.lock().get(&id).cloned()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn get(&self, id: InventoryId) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self.snapshot(id))
    }

    async fn set_minted(&self, id: InventoryId, signature: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock();
        let item = items
            .get_mut(&id)
            .ok_or_else(|| StoreError::Conflict(format!("inventory item {id} not found")))?;
        if item.minted {
            return Err(StoreError::Conflict(format!(
                "inventory item {id} is already minted"
            )));
        }
        item.minted = true;
        item.tx_signature = Some(signature.to_string());
        Ok(())
    }
}
