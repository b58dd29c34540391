use std::path::PathBuf;

use clap::Parser;
use mint_core::ServiceConfig;

/// HTTP front end for firearm registry mints.
///
/// Ledger flags override the matching values in the config file.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON config file; built-in defaults are used when absent.
    #[arg(long, env = "MINT_SERVICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base58 id of the registry program.
    #[arg(long, env = "REGISTRY_PROGRAM_ID")]
    pub program_id: Option<String>,

    /// Keypair file of the custodial authority.
    #[arg(long, env = "CUSTODIAL_KEYPAIR_PATH")]
    pub keypair_path: Option<PathBuf>,

    #[arg(long, env = "LEDGER_RPC_URL")]
    pub rpc_url: Option<String>,

    #[arg(long, env = "MINT_LISTEN_ADDR")]
    pub listen_addr: Option<String>,
}

impl Args {
    pub fn apply(&self, cfg: &mut ServiceConfig) {
        cfg.ledger.override_with(
            self.program_id.as_deref(),
            self.keypair_path.as_deref(),
            self.rpc_url.as_deref(),
        );
        if let Some(addr) = self.listen_addr.as_deref().filter(|a| !a.trim().is_empty()) {
            cfg.listen_addr = addr.to_string();
        }
    }
}
