//! Program-derived addresses for the firearm registry program.
//!
//! Each address hashes the seeds, a one-byte bump, the program id, and the
//! literal `ProgramDerivedAddress` with SHA-256. The highest bump whose hash
//! does not decompress to an Ed25519 point wins, so no key pair can sign for
//! the account.
//!
//! The registry uses two account families:
//!
//! ```text
//! config    seeds = ["config"]
//! firearm   seeds = ["firearm", id as u64 LE]
//! ```

use sha2::{Digest, Sha256};

use crate::error::WireError;

/// Seed of the singleton registry config account.
pub const CONFIG_SEED: &[u8] = b"config";

/// Seed prefix of per-firearm record accounts.
pub const FIREARM_SEED: &[u8] = b"firearm";

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

pub fn config_address(program_id: &[u8; 32]) -> Result<[u8; 32], WireError> {
    Ok(find_program_address(&[CONFIG_SEED], program_id)?.0)
}

/// Record account of firearm `id`; the id seed is little-endian.
pub fn firearm_address(program_id: &[u8; 32], id: u64) -> Result<[u8; 32], WireError> {
    Ok(find_program_address(&[FIREARM_SEED, &id.to_le_bytes()], program_id)?.0)
}

/// Search bumps from 255 downward and return the first off-curve candidate
/// with its bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), WireError> {
    (0..=u8::MAX)
        .rev()
        .map(|bump| (candidate(seeds, bump, program_id), bump))
        .find(|(hash, _)| !is_on_curve(hash))
        .ok_or_else(|| {
            WireError::InvalidAddress(format!(
                "no bump yields an off-curve address for {} seeds",
                seeds.len()
            ))
        })
}

fn candidate(seeds: &[&[u8]], bump: u8, program_id: &[u8; 32]) -> [u8; 32] {
    let digest = seeds
        .iter()
        .fold(Sha256::new(), |h, seed| h.chain_update(seed))
        .chain_update([bump])
        .chain_update(program_id)
        .chain_update(PDA_MARKER)
        .finalize();
    digest.into()
}

/// True when `bytes` decompress to an Ed25519 point, i.e. someone could
/// hold the private key.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
