//! Off-chain collaborators the mint pipeline depends on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{InventoryId, InventoryItem};

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get(&self, id: InventoryId) -> Result<Option<InventoryItem>, StoreError>;

    /// Flip `minted` to true and record the transaction signature. Fails with
    /// [`StoreError::Conflict`] if the item is missing or already minted.
    async fn set_minted(&self, id: InventoryId, signature: &str) -> Result<(), StoreError>;
}

/// Dealer mint credits.
///
/// Both operations are idempotent per `reference`: replaying a reserve
/// returns its first outcome without spending again, and a refund only
/// applies to a reference that is still reserved.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Conditionally take one credit. `false` means the balance was empty.
    async fn reserve(&self, dealer_id: &str, reference: &str) -> Result<bool, StoreError>;

    async fn refund(&self, dealer_id: &str, reference: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for Arc<T> {
    async fn get(&self, id: InventoryId) -> Result<Option<InventoryItem>, StoreError> {
        (**self).get(id).await
    }

    async fn set_minted(&self, id: InventoryId, signature: &str) -> Result<(), StoreError> {
        (**self).set_minted(id, signature).await
    }
}

#[async_trait]
impl<T: CreditLedger + ?Sized> CreditLedger for Arc<T> {
    async fn reserve(&self, dealer_id: &str, reference: &str) -> Result<bool, StoreError> {
        (**self).reserve(dealer_id, reference).await
    }

    async fn refund(&self, dealer_id: &str, reference: &str) -> Result<(), StoreError> {
        (**self).refund(dealer_id, reference).await
    }
}
