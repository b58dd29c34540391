use serde::Serialize;

/// Read-only view of the on-chain registry config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryView {
    pub initialized: bool,
    pub program_id: String,
    pub config_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_id: Option<u64>,
}
