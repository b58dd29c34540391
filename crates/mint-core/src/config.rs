//! Configuration for the mint pipeline and the service around it.
//!
//! Loaded from a JSON file. The three ledger values can be overridden by the
//! caller (the service takes them from flags or the environment); they have
//! no defaults and are checked by [`LedgerConfig::resolve`] before any mint
//! flow starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ledger_wire::{address_to_bytes, PayloadLayout};
use registry_client::{ClientOptions, Commitment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub keypair_path: Option<PathBuf>,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub commitment: Commitment,
    #[serde(default = "LedgerConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "LedgerConfig::default_max_poll_failures")]
    pub max_poll_failures: u32,
    #[serde(default = "LedgerConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Ledger settings after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLedger {
    pub program_id: [u8; 32],
    pub keypair_path: PathBuf,
    pub rpc_url: String,
    pub client: ClientOptions,
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            program_id: None,
            keypair_path: None,
            rpc_url: None,
            commitment: Commitment::default(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            max_poll_failures: Self::default_max_poll_failures(),
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}

impl LedgerConfig {
    fn default_poll_interval_ms() -> u64 {
        500
    }

    fn default_max_poll_failures() -> u32 {
        20
    }

    fn default_request_timeout_secs() -> u64 {
        30
    }

    /// Replace ledger values with any non-empty override, such as one taken
    /// from the command line or environment.
    pub fn override_with(
        &mut self,
        program_id: Option<&str>,
        keypair_path: Option<&Path>,
        rpc_url: Option<&str>,
    ) {
        let present = |v: &&str| !v.trim().is_empty();
        if let Some(v) = program_id.filter(present) {
            self.program_id = Some(v.to_string());
        }
        if let Some(p) = keypair_path.filter(|p| !p.as_os_str().is_empty()) {
            self.keypair_path = Some(p.to_path_buf());
        }
        if let Some(v) = rpc_url.filter(present) {
            self.rpc_url = Some(v.to_string());
        }
    }

    pub fn resolve(&self) -> Result<ResolvedLedger, ConfigError> {
        let program_id = self
            .program_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingConfig("ledger.program_id"))?;
        let program_id = address_to_bytes(program_id).map_err(|e| ConfigError::Invalid {
            field: "ledger.program_id",
            reason: e.to_string(),
        })?;

        let keypair_path = self
            .keypair_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingConfig("ledger.keypair_path"))?;

        let rpc_url = self
            .rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingConfig("ledger.rpc_url"))?;
        if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "ledger.rpc_url",
                reason: format!("expected an http(s) url, got {rpc_url}"),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "ledger.poll_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(ResolvedLedger {
            program_id,
            keypair_path,
            rpc_url: rpc_url.to_string(),
            client: ClientOptions {
                commitment: self.commitment,
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                max_poll_failures: self.max_poll_failures,
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

/// Orchestrator behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MintConfig {
    /// Retry a dispatch failure once with the legacy handler name.
    #[serde(default = "default_true")]
    pub legacy_discriminator_fallback: bool,
    #[serde(default)]
    pub payload_layout: PayloadLayout,
    /// Serialize id allocation and mint submission within this process.
    #[serde(default = "default_true")]
    pub serialize_allocations: bool,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            legacy_discriminator_fallback: true,
            payload_layout: PayloadLayout::default(),
            serialize_allocations: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "ServiceConfig::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default = "ServiceConfig::default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub mint: MintConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            log_level: Self::default_log_level(),
            json_logs: false,
            database_path: Self::default_database_path(),
            ledger: LedgerConfig::default(),
            mint: MintConfig::default(),
        }
    }
}

impl ServiceConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_database_path() -> PathBuf {
        PathBuf::from("data/mint.sqlite3")
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut cfg: ServiceConfig = serde_json::from_str(raw)?;
        if cfg.listen_addr.trim().is_empty() {
            cfg.listen_addr = Self::default_listen_addr();
        }
        if cfg.log_level.trim().is_empty() {
            cfg.log_level = Self::default_log_level();
        }
        Ok(cfg)
    }

    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(Self::default()),
            Some(p) => {
                let raw = fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_json(&raw)
            }
        }
    }
}
