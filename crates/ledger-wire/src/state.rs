//! Decoding of registry program accounts.

use crate::codec::Decoder;
use crate::error::WireError;

/// Length of the record tag that prefixes every program-owned account.
pub const ACCOUNT_TAG_LEN: usize = 8;

/// Singleton registry config: `tag (8) | authority (32) | next_id (u64 LE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub authority: [u8; 32],
    pub next_id: u64,
}

impl RegistryConfig {
    pub const LEN: usize = ACCOUNT_TAG_LEN + 32 + 8;

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < Self::LEN {
            return Err(WireError::AccountDataError(format!(
                "registry config needs {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }

        let mut dec = Decoder::new(data);
        dec.skip(ACCOUNT_TAG_LEN)?;
        let authority = dec.read_bytes32()?;
        let next_id = dec.read_u64_le()?;

        Ok(Self { authority, next_id })
    }

    /// Inverse of [`RegistryConfig::decode`] with the given record tag.
    pub fn encode(&self, tag: &[u8; ACCOUNT_TAG_LEN]) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(tag);
        out.extend_from_slice(&self.authority);
        out.extend_from_slice(&self.next_id.to_le_bytes());
        out
    }
}
