//! Transaction construction: SPL-token instructions, associated token
//! account derivation, legacy message compilation, and signing.
//!
//! Account layouts and instruction tags follow the SPL Token and
//! Associated Token Account programs. The message is the legacy wire
//! format: header, compact-array of account keys, reference hash, then
//! compact-array of compiled instructions.

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use hongbao_types::{Address, Amount};

use crate::{LedgerError, ReferenceHash, Result};

/// The system program (all-zero address).
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// The SPL Token program (`TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`).
pub const TOKEN_PROGRAM_ID: Address = Address::new([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// The Associated Token Account program
/// (`ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`).
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// Mainnet USDC mint (`EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v`).
pub const USDC_MINT: Address = Address::new([
    198, 250, 122, 243, 190, 219, 173, 58, 61, 101, 243, 106, 171, 201, 116, 49, 177, 187, 228,
    194, 210, 246, 224, 228, 124, 166, 2, 3, 69, 47, 93, 97,
]);

/// SPL Token `Transfer` instruction tag.
const TRANSFER_TAG: u8 = 3;

/// One account reference inside an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountMeta {
    /// The referenced account.
    pub pubkey: Address,
    /// Whether the account must sign the transaction.
    pub is_signer: bool,
    /// Whether the instruction may mutate the account.
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account reference.
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account reference.
    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// One program invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// The program to invoke.
    pub program_id: Address,
    /// Accounts passed to the program.
    pub accounts: Vec<AccountMeta>,
    /// Opaque instruction data.
    pub data: Vec<u8>,
}

/// Derive the associated token account for `owner` and `mint`.
///
/// # Errors
///
/// - [`LedgerError::Other`] if no off-curve bump exists (practically
///   unreachable)
pub fn derive_associated_token_account(owner: &Address, mint: &Address) -> Result<Address> {
    find_program_address(
        &[
            owner.as_bytes(),
            TOKEN_PROGRAM_ID.as_bytes(),
            mint.as_bytes(),
        ],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
}

/// Find the program-derived address for the given seeds: hash the seeds,
/// a bump byte (from 255 downward), the program id, and the PDA domain
/// separator, and take the first candidate that is not an ed25519 curve
/// point.
fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<Address> {
    for bump in (0..=255u8).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.as_bytes());
        hasher.update(b"ProgramDerivedAddress");
        let candidate: [u8; 32] = hasher.finalize().into();
        if !is_on_curve(&candidate) {
            return Ok(Address::new(candidate));
        }
    }
    Err(LedgerError::Other(
        "no off-curve bump for program-derived address".to_string(),
    ))
}

/// Whether the bytes decompress to a valid ed25519 curve point.
fn is_on_curve(bytes: &[u8; 32]) -> bool {
    ed25519_dalek::VerifyingKey::from_bytes(bytes).is_ok()
}

/// Build an SPL Token `Transfer` instruction.
pub fn spl_transfer(
    source_account: &Address,
    destination_account: &Address,
    owner: &Address,
    amount: Amount,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(TRANSFER_TAG);
    data.extend_from_slice(&amount.micro_units().to_le_bytes());
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*source_account, false),
            AccountMeta::writable(*destination_account, false),
            AccountMeta::readonly(*owner, true),
        ],
        data,
    }
}

/// Build a `CreateAssociatedTokenAccount` instruction for `owner`'s account
/// of `mint`, funded by `payer`.
pub fn create_associated_token_account(
    payer: &Address,
    owner: &Address,
    mint: &Address,
    associated_account: &Address,
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(*associated_account, false),
            AccountMeta::readonly(*owner, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: Vec::new(),
    }
}

/// Compile instructions into legacy message bytes.
///
/// Account keys are ordered signer-writable, signer-readonly,
/// nonsigner-writable, nonsigner-readonly, with `payer` always first.
///
/// # Errors
///
/// - [`LedgerError::Other`] if the account table exceeds the one-byte
///   index space (not reachable for transfer-sized transactions)
pub fn compile_message(
    payer: &Address,
    instructions: &[Instruction],
    reference: &ReferenceHash,
) -> Result<Vec<u8>> {
    // Merge account flags across all instructions, payer first.
    let mut merged: Vec<(Address, bool, bool)> = vec![(*payer, true, true)];
    let mut merge = |pubkey: Address, is_signer: bool, is_writable: bool| {
        match merged.iter_mut().find(|(k, _, _)| *k == pubkey) {
            Some((_, signer, writable)) => {
                *signer |= is_signer;
                *writable |= is_writable;
            }
            None => merged.push((pubkey, is_signer, is_writable)),
        }
    };
    for instruction in instructions {
        for meta in &instruction.accounts {
            merge(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        merge(instruction.program_id, false, false);
    }

    let mut account_keys: Vec<Address> = Vec::with_capacity(merged.len());
    for (want_signer, want_writable) in [(true, true), (true, false), (false, true), (false, false)]
    {
        account_keys.extend(
            merged
                .iter()
                .filter(|(_, s, w)| *s == want_signer && *w == want_writable)
                .map(|(k, _, _)| *k),
        );
    }
    if account_keys.len() > u8::MAX as usize {
        return Err(LedgerError::Other(
            "too many accounts for a single transaction".to_string(),
        ));
    }

    let num_signers = merged.iter().filter(|(_, s, _)| *s).count() as u8;
    let num_readonly_signed = merged.iter().filter(|(_, s, w)| *s && !*w).count() as u8;
    let num_readonly_unsigned = merged.iter().filter(|(_, s, w)| !*s && !*w).count() as u8;

    let index_of = |pubkey: &Address| -> Result<u8> {
        account_keys
            .iter()
            .position(|k| k == pubkey)
            .map(|i| i as u8)
            .ok_or_else(|| LedgerError::Other("account missing from key table".to_string()))
    };

    let mut message = Vec::new();
    message.push(num_signers);
    message.push(num_readonly_signed);
    message.push(num_readonly_unsigned);
    encode_compact_u16(&mut message, account_keys.len() as u16);
    for key in &account_keys {
        message.extend_from_slice(key.as_bytes());
    }
    message.extend_from_slice(reference.as_bytes());
    encode_compact_u16(&mut message, instructions.len() as u16);
    for instruction in instructions {
        message.push(index_of(&instruction.program_id)?);
        encode_compact_u16(&mut message, instruction.accounts.len() as u16);
        for meta in &instruction.accounts {
            message.push(index_of(&meta.pubkey)?);
        }
        encode_compact_u16(&mut message, instruction.data.len() as u16);
        message.extend_from_slice(&instruction.data);
    }
    Ok(message)
}

/// Sign message bytes and assemble the full transaction wire form
/// (compact signature array followed by the message).
pub fn sign_transaction(message: &[u8], signing_key: &SigningKey) -> Vec<u8> {
    let signature = signing_key.sign(message);
    let mut transaction = Vec::with_capacity(1 + 64 + message.len());
    encode_compact_u16(&mut transaction, 1);
    transaction.extend_from_slice(&signature.to_bytes());
    transaction.extend_from_slice(message);
    transaction
}

/// Shortvec length encoding: 7 bits per byte, high bit as continuation.
fn encode_compact_u16(buf: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn test_address(tag: u8) -> Address {
        let mut bytes = [0u8; 32];
        bytes[0] = tag;
        bytes[31] = tag;
        Address::new(bytes)
    }

    fn test_signing_key(seed: u64) -> SigningKey {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        SigningKey::from_bytes(&secret)
    }

    #[test]
    fn test_compact_u16_encoding() {
        let cases: [(u16, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0x3fff, &[0xff, 0x7f]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            encode_compact_u16(&mut buf, value);
            assert_eq!(buf, expected, "encoding of {value}");
        }
    }

    #[test]
    fn test_derived_account_is_off_curve() {
        let owner = Address::new(test_signing_key(1).verifying_key().to_bytes());
        let ata = derive_associated_token_account(&owner, &USDC_MINT).expect("derive");
        assert!(!is_on_curve(ata.as_bytes()));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let owner = Address::new(test_signing_key(2).verifying_key().to_bytes());
        let a = derive_associated_token_account(&owner, &USDC_MINT).expect("derive");
        let b = derive_associated_token_account(&owner, &USDC_MINT).expect("derive");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derivation_differs_per_owner() {
        let owner_a = Address::new(test_signing_key(3).verifying_key().to_bytes());
        let owner_b = Address::new(test_signing_key(4).verifying_key().to_bytes());
        let a = derive_associated_token_account(&owner_a, &USDC_MINT).expect("derive");
        let b = derive_associated_token_account(&owner_b, &USDC_MINT).expect("derive");
        assert_ne!(a, b);
    }

    #[test]
    fn test_real_public_key_is_on_curve() {
        let key = test_signing_key(5).verifying_key();
        assert!(is_on_curve(&key.to_bytes()));
    }

    #[test]
    fn test_transfer_instruction_layout() {
        let source = test_address(1);
        let destination = test_address(2);
        let owner = test_address(3);
        let ix = spl_transfer(&source, &destination, &owner, Amount::from_micro_units(1_500_000));

        assert_eq!(ix.program_id, TOKEN_PROGRAM_ID);
        assert_eq!(ix.data[0], TRANSFER_TAG);
        assert_eq!(&ix.data[1..], &1_500_000u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 3);
        assert!(ix.accounts[0].is_writable && !ix.accounts[0].is_signer);
        assert!(ix.accounts[1].is_writable && !ix.accounts[1].is_signer);
        assert!(!ix.accounts[2].is_writable && ix.accounts[2].is_signer);
    }

    #[test]
    fn test_create_account_instruction_layout() {
        let payer = test_address(1);
        let owner = test_address(2);
        let ata = test_address(3);
        let ix = create_associated_token_account(&payer, &owner, &USDC_MINT, &ata);

        assert_eq!(ix.program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert!(ix.data.is_empty());
        assert_eq!(ix.accounts.len(), 6);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[4].pubkey, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.accounts[5].pubkey, TOKEN_PROGRAM_ID);
    }

    #[test]
    fn test_compile_message_header_and_order() {
        let payer = test_address(1);
        let source = test_address(2);
        let destination = test_address(3);
        let reference = ReferenceHash::new([9u8; 32]);
        let ix = spl_transfer(&source, &destination, &payer, Amount::from_micro_units(5));

        let message = compile_message(&payer, &[ix], &reference).expect("compile");

        // Header: one signer (the payer, writable), no readonly signers,
        // one readonly unsigned key (the token program).
        assert_eq!(&message[..3], &[1, 0, 1]);
        // Four keys follow, payer first.
        assert_eq!(message[3], 4);
        assert_eq!(&message[4..36], payer.as_bytes());
        // Token program is last (readonly unsigned).
        assert_eq!(&message[4 + 3 * 32..4 + 4 * 32], TOKEN_PROGRAM_ID.as_bytes());
        // The reference hash lands right after the key table.
        assert_eq!(&message[4 + 4 * 32..4 + 4 * 32 + 32], &[9u8; 32]);
    }

    #[test]
    fn test_compile_message_bundled_instructions() {
        // A create-account + transfer bundle compiles into one message.
        let signing_key = test_signing_key(6);
        let payer = Address::new(signing_key.verifying_key().to_bytes());
        let owner = Address::new(test_signing_key(7).verifying_key().to_bytes());
        let source = derive_associated_token_account(&payer, &USDC_MINT).expect("derive");
        let destination = derive_associated_token_account(&owner, &USDC_MINT).expect("derive");
        let reference = ReferenceHash::new([1u8; 32]);

        let instructions = vec![
            create_associated_token_account(&payer, &owner, &USDC_MINT, &destination),
            spl_transfer(&source, &destination, &payer, Amount::from_micro_units(42)),
        ];
        let message = compile_message(&payer, &instructions, &reference).expect("compile");

        // One signer, and the instruction count byte says two instructions.
        assert_eq!(message[0], 1);
        let key_count = message[3] as usize;
        let ix_count_offset = 4 + key_count * 32 + 32;
        assert_eq!(message[ix_count_offset], 2);
    }

    #[test]
    fn test_sign_transaction_verifies() {
        let signing_key = test_signing_key(8);
        let payer = Address::new(signing_key.verifying_key().to_bytes());
        let reference = ReferenceHash::new([2u8; 32]);
        let ix = spl_transfer(
            &test_address(1),
            &test_address(2),
            &payer,
            Amount::from_micro_units(7),
        );
        let message = compile_message(&payer, &[ix], &reference).expect("compile");
        let transaction = sign_transaction(&message, &signing_key);

        // Layout: count byte, 64-byte signature, then the message.
        assert_eq!(transaction[0], 1);
        assert_eq!(&transaction[65..], &message[..]);
        let signature = ed25519_dalek::Signature::from_bytes(
            transaction[1..65].try_into().expect("64 bytes"),
        );
        signing_key
            .verifying_key()
            .verify(&message, &signature)
            .expect("signature must verify");
    }
}
