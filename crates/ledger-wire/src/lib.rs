//! Wire-level support for the firearm registry program.
//!
//! Instruction payloads, program-derived addresses, account state, and the
//! signed transaction format are all encoded here by hand. The crate does no
//! I/O; `registry-client` moves the bytes.

pub mod address;
pub mod codec;
pub mod discriminator;
pub mod error;
pub mod instruction;
pub mod pda;
pub mod state;
pub mod transaction;

pub use address::{address_to_bytes, bytes_to_address, signature_from_str, signature_to_string};
pub use codec::{
    encode_i64_le, encode_option_i64, encode_string, encode_u32_le, encode_u64_le, Decoder,
    Encoder,
};
pub use discriminator::{
    discriminator_hex, instruction_discriminator, HandlerName, RegistryAbi, REGISTRY_ABI_V1,
};
pub use error::WireError;
pub use instruction::{build_initialize, build_mint, encode_mint_args, FirearmFields, PayloadLayout};
pub use pda::{config_address, find_program_address, firearm_address};
pub use state::RegistryConfig;
pub use transaction::{
    compile_message, decode_compact_u16, decode_transaction, encode_compact_u16,
    serialize_message, sign_transaction, AccountMeta, CompiledInstruction, DecodedTransaction,
    Instruction, Message, MessageHeader, SignedTransaction, SYSTEM_PROGRAM_ID,
};
