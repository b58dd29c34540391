//! Base58 text forms of keys, program-derived addresses, and signatures.

use crate::error::WireError;

fn decode_base58<const N: usize>(text: &str, what: &str) -> Result<[u8; N], WireError> {
    let raw = bs58::decode(text.trim())
        .into_vec()
        .map_err(|e| WireError::InvalidAddress(format!("{what} is not base58: {e}")))?;
    let len = raw.len();
    raw.try_into()
        .map_err(|_| WireError::InvalidAddress(format!("{what} must be {N} bytes, got {len}")))
}

/// Also used for blockhashes, which share the encoding.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], WireError> {
    decode_base58(address, "address")
}

pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Transaction signatures are reported by nodes in base58 too.
pub fn signature_to_string(signature: &[u8; 64]) -> String {
    bs58::encode(signature).into_string()
}

pub fn signature_from_str(signature: &str) -> Result<[u8; 64], WireError> {
    decode_base58(signature, "signature")
}
