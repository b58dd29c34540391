use std::sync::Arc;

use async_trait::async_trait;
use ledger_wire::bytes_to_address;
use mint_core::{CreditLedger, InventoryStore, MintError, MintOrchestrator, MintReceipt, MintRequest};
use registry_client::LedgerRpc;

use crate::dto::RegistryView;

/// What the routes need from the mint pipeline.
#[async_trait]
pub trait MintApi: Send + Sync {
    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt, MintError>;

    async fn registry(&self) -> Result<RegistryView, MintError>;
}

#[async_trait]
impl<R, I, C> MintApi for MintOrchestrator<R, I, C>
where
    R: LedgerRpc,
    I: InventoryStore,
    C: CreditLedger,
{
    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt, MintError> {
        MintOrchestrator::mint(self, request).await
    }

    async fn registry(&self) -> Result<RegistryView, MintError> {
        let config_address = self.config_address()?;
        let config = self.registry_config().await?;
        Ok(RegistryView {
            initialized: config.is_some(),
            program_id: bytes_to_address(self.client().program_id()),
            config_address: bytes_to_address(&config_address),
            authority: config.map(|c| bytes_to_address(&c.authority)),
            next_id: config.map(|c| c.next_id),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub mint: Arc<dyn MintApi>,
}

impl AppState {
    pub fn new(mint: Arc<dyn MintApi>) -> Self {
        Self { mint }
    }
}
