//! Registry transactions on the wire.
//!
//! A wire transaction is a signature table followed by the message those
//! signatures cover. Every length prefix in either part is a compact-u16
//! (little-endian base-128, at most three bytes).
//!
//! The message begins with a three-byte [`MessageHeader`], then the account
//! key table, the recent blockhash, and the compiled instructions. Each
//! instruction refers to its program and accounts by their position in the
//! key table.
//!
//! Registry transactions carry exactly one signature: the custodial
//! authority pays the fee and signs. Program-derived accounts are never
//! signers.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::address;
use crate::error::WireError;

/// The system program, all zero bytes (`11111111111111111111111111111111`).
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// Append `value` to `out` as a compact-u16.
fn put_compact_u16(out: &mut Vec<u8>, value: u16) {
    let mut rest = value;
    while rest >= 0x80 {
        out.push((rest as u8 & 0x7f) | 0x80);
        rest >>= 7;
    }
    out.push(rest as u8);
}

/// Compact-u16 encoding of `value`: one byte below 0x80, two below 0x4000,
/// three otherwise.
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    put_compact_u16(&mut out, value);
    out
}

/// Read a compact-u16 from the front of `data`, returning the value and the
/// number of bytes it occupied.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), WireError> {
    let mut value = 0u32;
    for (i, byte) in data.iter().take(3).enumerate() {
        value |= u32::from(byte & 0x7f) << (7 * i);
        let last = byte & 0x80 == 0 || i == 2;
        if last {
            let value = u16::try_from(value)
                .map_err(|_| WireError::SerializationError("compact-u16 overflows u16".into()))?;
            return Ok((value, i + 1));
        }
    }
    Err(WireError::SerializationError(
        "compact-u16 runs past end of input".into(),
    ))
}

fn put_len(out: &mut Vec<u8>, len: usize, what: &str) -> Result<(), WireError> {
    let len = u16::try_from(len)
        .map_err(|_| WireError::SerializationError(format!("too many {what}: {len}")))?;
    put_compact_u16(out, len);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A program call with its accounts spelled out as keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// An instruction whose keys have been replaced by key-table positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// Describes how the key table splits into signer and writable ranges.
///
/// The table is ordered writable signers, readonly signers, writable
/// non-signers, readonly non-signers, so three counts are enough.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub required_signatures: u8,
    pub readonly_signed: u8,
    pub readonly_unsigned: u8,
}

/// An unsigned message, ready to be serialized and signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<[u8; 32]>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signed = usize::from(self.header.required_signatures);
        let limit = if index < signed {
            signed.saturating_sub(usize::from(self.header.readonly_signed))
        } else {
            self.account_keys
                .len()
                .saturating_sub(usize::from(self.header.readonly_unsigned))
        };
        index < limit
    }

    /// The bytes covered by the transaction signatures.
    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::with_capacity(3 + 1 + 32 * (self.account_keys.len() + 1) + 64);
        out.extend_from_slice(&[
            self.header.required_signatures,
            self.header.readonly_signed,
            self.header.readonly_unsigned,
        ]);

        put_len(&mut out, self.account_keys.len(), "account keys")?;
        self.account_keys.iter().for_each(|key| out.extend_from_slice(key));
        out.extend_from_slice(&self.recent_blockhash);

        put_len(&mut out, self.instructions.len(), "instructions")?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            put_len(&mut out, ix.account_indices.len(), "instruction accounts")?;
            out.extend_from_slice(&ix.account_indices);
            put_len(&mut out, ix.data.len(), "instruction data bytes")?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }
}

/// Free-function form of [`Message::serialize`].
pub fn serialize_message(message: &Message) -> Result<Vec<u8>, WireError> {
    message.serialize()
}

/// Signed wire bytes plus the fee payer's signature, which is the
/// transaction id nodes report back.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub wire: Vec<u8>,
    pub signature: [u8; 64],
}

impl SignedTransaction {
    pub fn signature_string(&self) -> String {
        address::signature_to_string(&self.signature)
    }
}

/// Access class used to order the key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Access {
    SignerWritable,
    SignerReadonly,
    Writable,
    Readonly,
}

impl Access {
    fn of(signer: bool, writable: bool) -> Self {
        match (signer, writable) {
            (true, true) => Access::SignerWritable,
            (true, false) => Access::SignerReadonly,
            (false, true) => Access::Writable,
            (false, false) => Access::Readonly,
        }
    }
}

/// Compile `instructions` into a message paid for by `fee_payer`.
///
/// A key used by several instructions is listed once with the union of its
/// flags. The fee payer always lands at index 0.
pub fn compile_message(
    instructions: &[Instruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<Message, WireError> {
    if instructions.is_empty() {
        return Err(WireError::TransactionBuildError(
            "cannot compile a message without instructions".into(),
        ));
    }

    // (key, signer, writable) in first-seen order.
    let mut keys: Vec<([u8; 32], bool, bool)> = vec![(*fee_payer, true, true)];
    let uses = instructions.iter().flat_map(|ix| {
        ix.accounts
            .iter()
            .map(|m| (m.pubkey, m.is_signer, m.is_writable))
            .chain(std::iter::once((ix.program_id, false, false)))
    });
    for (key, signer, writable) in uses {
        match keys.iter_mut().find(|(k, _, _)| *k == key) {
            Some(slot) => {
                slot.1 |= signer;
                slot.2 |= writable;
            }
            None => keys.push((key, signer, writable)),
        }
    }
    // sort_by_key is stable: the fee payer stays first among writable signers.
    keys.sort_by_key(|(_, signer, writable)| Access::of(*signer, *writable));

    if keys.len() > 256 {
        return Err(WireError::TransactionBuildError(format!(
            "{} accounts do not fit u8 indices",
            keys.len()
        )));
    }

    let count = |class: Access| {
        keys.iter()
            .filter(|(_, s, w)| Access::of(*s, *w) == class)
            .count() as u8
    };
    let header = MessageHeader {
        required_signatures: count(Access::SignerWritable) + count(Access::SignerReadonly),
        readonly_signed: count(Access::SignerReadonly),
        readonly_unsigned: count(Access::Readonly),
    };
    let account_keys: Vec<[u8; 32]> = keys.into_iter().map(|(k, _, _)| k).collect();

    let position = |key: &[u8; 32]| -> Result<u8, WireError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| {
                WireError::TransactionBuildError(format!(
                    "{} missing from key table",
                    address::bytes_to_address(key)
                ))
            })
    };

    let instructions = instructions
        .iter()
        .map(|ix| -> Result<CompiledInstruction, WireError> {
            Ok(CompiledInstruction {
                program_id_index: position(&ix.program_id)?,
                account_indices: ix
                    .accounts
                    .iter()
                    .map(|m| position(&m.pubkey))
                    .collect::<Result<_, WireError>>()?,
                data: ix.data.clone(),
            })
        })
        .collect::<Result<Vec<_>, WireError>>()?;

    Ok(Message {
        header,
        account_keys,
        recent_blockhash: *recent_blockhash,
        instructions,
    })
}

/// Sign `message` with the fee payer's key and produce wire bytes.
///
/// Only single-signer messages are accepted, and `signing_key` must own the
/// first account key.
pub fn sign_transaction(
    message: &Message,
    signing_key: &SigningKey,
) -> Result<SignedTransaction, WireError> {
    if message.header.required_signatures != 1 {
        return Err(WireError::SigningError(format!(
            "registry transactions take one signer, message wants {}",
            message.header.required_signatures
        )));
    }
    let payer = signing_key.verifying_key().to_bytes();
    if message.account_keys.first() != Some(&payer) {
        return Err(WireError::SigningError(
            "signing key is not the fee payer".into(),
        ));
    }

    let body = message.serialize()?;
    let signature = signing_key.sign(&body).to_bytes();

    let mut wire = Vec::with_capacity(1 + signature.len() + body.len());
    put_compact_u16(&mut wire, 1);
    wire.extend_from_slice(&signature);
    wire.extend_from_slice(&body);
    Ok(SignedTransaction { wire, signature })
}

/// A wire transaction split back into signatures and message.
#[derive(Debug, Clone)]
pub struct DecodedTransaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Message,
    /// The raw message bytes the signatures were made over.
    pub signed_bytes: Vec<u8>,
}

impl DecodedTransaction {
    pub fn verify_signatures(&self) -> Result<(), WireError> {
        let expected = usize::from(self.message.header.required_signatures);
        if self.signatures.len() != expected {
            return Err(WireError::SigningError(format!(
                "found {} signatures, header requires {expected}",
                self.signatures.len()
            )));
        }

        for (raw, key) in self.signatures.iter().zip(&self.message.account_keys) {
            let signer = VerifyingKey::from_bytes(key)
                .map_err(|e| WireError::SigningError(format!("bad signer key: {e}")))?;
            signer
                .verify_strict(&self.signed_bytes, &Signature::from_bytes(raw))
                .map_err(|e| {
                    WireError::SigningError(format!(
                        "signature by {} does not verify: {e}",
                        address::bytes_to_address(key)
                    ))
                })?;
        }
        Ok(())
    }

    pub fn account_keys(&self) -> &[[u8; 32]] {
        &self.message.account_keys
    }

    pub fn instructions(&self) -> &[CompiledInstruction] {
        &self.message.instructions
    }

    pub fn is_signer(&self, index: usize) -> bool {
        self.message.is_signer(index)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        self.message.is_writable(index)
    }
}

struct Reader<'a> {
    rest: &'a [u8],
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8], WireError> {
        if self.rest.len() < n {
            return Err(WireError::SerializationError(format!(
                "truncated transaction: {what} needs {n} bytes, {} left",
                self.rest.len()
            )));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn u8(&mut self, what: &str) -> Result<u8, WireError> {
        Ok(self.bytes(1, what)?[0])
    }

    fn len(&mut self) -> Result<usize, WireError> {
        let (value, used) = decode_compact_u16(self.rest)?;
        self.rest = &self.rest[used..];
        Ok(usize::from(value))
    }

    fn fixed<const N: usize>(&mut self, what: &str) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N, what)?);
        Ok(out)
    }
}

/// Parse wire bytes produced by [`sign_transaction`] or any other
/// single-message legacy transaction.
pub fn decode_transaction(raw: &[u8]) -> Result<DecodedTransaction, WireError> {
    let mut reader = Reader { rest: raw };

    let signature_count = reader.len()?;
    if signature_count == 0 {
        return Err(WireError::SerializationError(
            "transaction carries zero signatures".into(),
        ));
    }
    let signatures = (0..signature_count)
        .map(|_| reader.fixed::<64>("signature"))
        .collect::<Result<Vec<_>, _>>()?;

    let signed_bytes = reader.rest.to_vec();

    let header = MessageHeader {
        required_signatures: reader.u8("header")?,
        readonly_signed: reader.u8("header")?,
        readonly_unsigned: reader.u8("header")?,
    };

    let key_count = reader.len()?;
    let account_keys = (0..key_count)
        .map(|_| reader.fixed::<32>("account key"))
        .collect::<Result<Vec<_>, _>>()?;
    if usize::from(header.required_signatures) > key_count
        || usize::from(header.readonly_unsigned) > key_count
    {
        return Err(WireError::SerializationError(format!(
            "header counts exceed the {key_count} account keys"
        )));
    }

    let recent_blockhash = reader.fixed::<32>("blockhash")?;

    let ix_count = reader.len()?;
    let mut instructions = Vec::with_capacity(ix_count);
    for _ in 0..ix_count {
        let program_id_index = reader.u8("program index")?;
        let n = reader.len()?;
        let account_indices = reader.bytes(n, "account indices")?.to_vec();
        let n = reader.len()?;
        let data = reader.bytes(n, "instruction data")?.to_vec();

        let dangling = std::iter::once(&program_id_index)
            .chain(&account_indices)
            .find(|i| usize::from(**i) >= key_count);
        if let Some(index) = dangling {
            return Err(WireError::SerializationError(format!(
                "account index {index} outside key table of {key_count}"
            )));
        }
        instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data,
        });
    }

    if !reader.rest.is_empty() {
        return Err(WireError::SerializationError(format!(
            "{} unread bytes after the last instruction",
            reader.rest.len()
        )));
    }

    Ok(DecodedTransaction {
        signatures,
        message: Message {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        },
        signed_bytes,
    })
}
