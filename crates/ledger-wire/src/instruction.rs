//! Registry program instructions.
//!
//! Building is pure: nothing here touches the network. Handler names are
//! passed in explicitly so callers can apply the [`RegistryAbi`] contract
//! (including its legacy aliases) without rebuilding accounts.
//!
//! [`RegistryAbi`]: crate::discriminator::RegistryAbi

use serde::{Deserialize, Serialize};

use crate::codec::Encoder;
use crate::discriminator::instruction_discriminator;
use crate::error::WireError;
use crate::transaction::{AccountMeta, Instruction, SYSTEM_PROGRAM_ID};

/// Domain fields written into a firearm record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirearmFields {
    pub serial: String,
    pub make: String,
    pub model: String,
    pub caliber: String,
    /// Unix timestamp (seconds).
    pub acquisition_date: Option<i64>,
    pub owner_id: String,
}

/// Argument layout of `mint_firearm`.
///
/// Two program builds exist in the field: one takes an optional acquisition
/// date between `caliber` and `owner_id`, the other has no such field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadLayout {
    #[default]
    WithAcquisitionDate,
    WithoutAcquisitionDate,
}

/// Build the `initialize` instruction.
///
/// Accounts: `[config (w), authority (s, w), system program]`. No arguments.
pub fn build_initialize(
    program_id: &[u8; 32],
    authority: &[u8; 32],
    config: &[u8; 32],
    handler: &str,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(*config, false),
            AccountMeta::writable(*authority, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data: instruction_discriminator(handler).to_vec(),
    }
}

/// Build the `mint_firearm` instruction.
///
/// Accounts: `[config (w), firearm (w), authority (s, w), system program]`.
/// The firearm account is a PDA and is never marked as a signer.
pub fn build_mint(
    program_id: &[u8; 32],
    config: &[u8; 32],
    firearm: &[u8; 32],
    authority: &[u8; 32],
    fields: &FirearmFields,
    layout: PayloadLayout,
    handler: &str,
) -> Result<Instruction, WireError> {
    let data = encode_mint_args(&instruction_discriminator(handler), fields, layout)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(*config, false),
            AccountMeta::writable(*firearm, false),
            AccountMeta::writable(*authority, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

/// Encode `discriminator || serial || make || model || caliber ||
/// [acquisition_date] || owner_id`.
pub fn encode_mint_args(
    discriminator: &[u8; 8],
    fields: &FirearmFields,
    layout: PayloadLayout,
) -> Result<Vec<u8>, WireError> {
    let mut enc = Encoder::with_prefix(discriminator);
    enc.put_string(&fields.serial)?
        .put_string(&fields.make)?
        .put_string(&fields.model)?
        .put_string(&fields.caliber)?;

    if layout == PayloadLayout::WithAcquisitionDate {
        enc.put_option_i64(fields.acquisition_date);
    }

    enc.put_string(&fields.owner_id)?;
    Ok(enc.finish())
}
