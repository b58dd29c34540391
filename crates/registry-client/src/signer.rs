//! Custodial authority keypair loading.
//!
//! Keypair files hold a JSON array of 64 bytes: the 32-byte Ed25519 seed
//! followed by the 32-byte public key. The public half is checked against the
//! key derived from the seed so a truncated or spliced file is caught at
//! startup rather than at the first rejected signature.

use std::path::Path;

use ed25519_dalek::SigningKey;
use zeroize::{Zeroize, Zeroizing};

use crate::error::ClientError;

/// Parse a keypair from its JSON array encoding.
pub fn keypair_from_json(json: &str) -> Result<SigningKey, ClientError> {
    let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
        serde_json::from_str(json)
            .map_err(|e| ClientError::InvalidKeypair(format!("not a JSON byte array: {e}")))?,
    );

    if bytes.len() != 64 {
        return Err(ClientError::InvalidKeypair(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes[..32]);
    let signing_key = SigningKey::from_bytes(&seed);
    seed.zeroize();

    if signing_key.verifying_key().as_bytes()[..] != bytes[32..] {
        return Err(ClientError::InvalidKeypair(
            "public key does not match secret key".into(),
        ));
    }

    Ok(signing_key)
}

/// Read and parse a keypair file.
pub fn load_keypair_file(path: impl AsRef<Path>) -> Result<SigningKey, ClientError> {
    let path = path.as_ref();
    let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
        ClientError::InvalidKeypair(format!("cannot read {}: {e}", path.display()))
    })?);
    keypair_from_json(contents.trim())
}

/// Encode a keypair as the JSON byte array understood by [`keypair_from_json`].
pub fn keypair_to_json(signing_key: &SigningKey) -> Zeroizing<String> {
    let bytes = Zeroizing::new(signing_key.to_keypair_bytes());
    let list: Vec<String> = bytes.iter().map(u8::to_string).collect();
    Zeroizing::new(format!("[{}]", list.join(",")))
}
