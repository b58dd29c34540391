use std::fmt;

use ledger_wire::WireError;
use thiserror::Error;

/// Anchor `InstructionMissing`: data shorter than a discriminator.
pub const ANCHOR_INSTRUCTION_MISSING: u32 = 100;

/// Anchor `InstructionFallbackNotFound`: no handler matches the discriminator.
pub const ANCHOR_INSTRUCTION_FALLBACK_NOT_FOUND: u32 = 101;

/// Program log fragments the Anchor dispatcher emits when no handler
/// matches the instruction data.
const DISPATCH_LOG_MARKERS: [&str; 3] = [
    "InstructionFallbackNotFound",
    "Fallback functions are not supported",
    "InstructionMissing",
];

/// A rejection reported by the ledger node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
    /// `Custom(n)` program error code, when the node reported one.
    pub custom_code: Option<u32>,
    /// Index of the failing instruction for an `InstructionError`.
    pub instruction_index: Option<u8>,
    /// Variant name of the node's error, e.g. `InvalidInstructionData` or
    /// `BlockhashNotFound`.
    pub error_name: Option<String>,
    /// Program log lines from preflight simulation, if any.
    pub logs: Vec<String>,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            custom_code: None,
            instruction_index: None,
            error_name: None,
            logs: Vec::new(),
        }
    }

    /// A program `Custom(code)` error raised by the first instruction.
    pub fn with_code(self, code: u32) -> Self {
        self.in_instruction(0, "Custom").code(code)
    }

    fn code(mut self, code: u32) -> Self {
        self.custom_code = Some(code);
        self
    }

    pub fn in_instruction(mut self, index: u8, error_name: impl Into<String>) -> Self {
        self.instruction_index = Some(index);
        self.error_name = Some(error_name.into());
        self
    }

    /// A failure of the transaction as a whole, outside any instruction.
    pub fn transaction_level(mut self, error_name: impl Into<String>) -> Self {
        self.instruction_index = None;
        self.error_name = Some(error_name.into());
        self
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    /// Whether the program failed to dispatch the instruction at all, which is
    /// what a discriminator mismatch looks like.
    ///
    /// True for Anchor codes 100 and 101, for a runtime
    /// `InvalidInstructionData`, and for a shapeless rejection whose logs come
    /// from the dispatcher. Transaction-level errors such as
    /// `BlockhashNotFound` never qualify.
    pub fn is_dispatch_failure(&self) -> bool {
        if let Some(code) = self.custom_code {
            return code == ANCHOR_INSTRUCTION_MISSING
                || code == ANCHOR_INSTRUCTION_FALLBACK_NOT_FOUND;
        }
        if self.instruction_index.is_some() {
            return self.error_name.as_deref() == Some("InvalidInstructionData");
        }
        self.error_name.is_none()
            && self
                .logs
                .iter()
                .any(|line| DISPATCH_LOG_MARKERS.iter().any(|m| line.contains(m)))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.custom_code {
            Some(code) => write!(f, "{} (custom program error {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ledger RPC and submission errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction rejected: {0}")]
    Rejected(Rejection),

    #[error("transaction {signature} not confirmed before block height {last_valid_block_height}")]
    Expired {
        signature: String,
        last_valid_block_height: u64,
    },

    #[error("outcome of transaction {signature} unknown: {reason}")]
    Unresolved { signature: String, reason: String },

    #[error("malformed rpc response: {0}")]
    Malformed(String),

    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl ClientError {
    /// The ledger refused the transaction; resubmitting the same bytes will
    /// not help.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Rejected(_))
    }

    /// The blockhash window closed before confirmation. The transaction can
    /// no longer land, so a fresh attempt is safe.
    pub fn is_expired(&self) -> bool {
        matches!(self, ClientError::Expired { .. })
    }

    /// Signature of a submitted transaction whose fate is not known.
    pub fn pending_signature(&self) -> Option<&str> {
        match self {
            ClientError::Expired { signature, .. } | ClientError::Unresolved { signature, .. } => {
                Some(signature)
            }
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ClientError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
