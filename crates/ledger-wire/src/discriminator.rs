//! Instruction selectors and the registry program's method-name contract.
//!
//! Every instruction sent to the registry program starts with an 8-byte
//! discriminator: the first 8 bytes of `SHA-256("global:" + handler_name)`.
//! The program dispatches on these bytes, so a wrong handler name surfaces
//! as an on-chain rejection rather than a decodable error.

use sha2::{Digest, Sha256};

/// Compute the 8-byte instruction discriminator for a handler name.
pub fn instruction_discriminator(handler: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"global:");
    hasher.update(handler.as_bytes());
    let hash = hasher.finalize();

    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// A handler name with an optional legacy spelling.
///
/// The registry program has been deployed with handler names in two casing
/// styles. `canonical` is always tried first; `legacy` exists only as a
/// one-shot compatibility shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerName {
    pub canonical: &'static str,
    pub legacy: Option<&'static str>,
}

impl HandlerName {
    pub const fn new(canonical: &'static str) -> Self {
        Self {
            canonical,
            legacy: None,
        }
    }

    pub const fn with_legacy(canonical: &'static str, legacy: &'static str) -> Self {
        Self {
            canonical,
            legacy: Some(legacy),
        }
    }

    /// Names to attempt, in order. Never more than two.
    pub fn candidates(&self, allow_legacy: bool) -> Vec<&'static str> {
        let mut out = vec![self.canonical];
        if allow_legacy {
            if let Some(legacy) = self.legacy {
                if legacy != self.canonical {
                    out.push(legacy);
                }
            }
        }
        out
    }
}

/// Versioned method-name contract of the registry program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryAbi {
    pub version: u16,
    pub initialize: HandlerName,
    pub mint_firearm: HandlerName,
}

/// Version 1: snake_case handlers, with the camelCase mint handler accepted
/// as a legacy alias.
pub const REGISTRY_ABI_V1: RegistryAbi = RegistryAbi {
    version: 1,
    initialize: HandlerName::new("initialize"),
    mint_firearm: HandlerName::with_legacy("mint_firearm", "mintFirearm"),
};

/// Render a discriminator for logs and error messages.
pub fn discriminator_hex(disc: &[u8; 8]) -> String {
    hex::encode(disc)
}
