//! The ledger client contract consumed by the disbursement engine.

use async_trait::async_trait;
use hongbao_types::{Address, Amount};

use crate::{LedgerError, Result};

/// A short-lived reference hash anchoring a submission (a freshness nonce).
///
/// References expire quickly; a fresh one must be fetched before every
/// submission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceHash([u8; 32]);

impl ReferenceHash {
    /// Wrap raw reference bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a base58-encoded reference hash.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Other`] if the string is not 32 base58-encoded bytes
    pub fn from_base58(s: &str) -> Result<Self> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|e| LedgerError::Other(format!("invalid reference hash '{s}': {e}")))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| {
                LedgerError::Other(format!("reference hash must be 32 bytes, got {}", v.len()))
            })?;
        Ok(Self(bytes))
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// An accepted submission's transaction identifier.
pub type TxSignature = String;

/// One atomic submission unit: the funds transfer, optionally bundled with
/// creation of the destination's receiving account.
///
/// When `create_account` is set, account creation and the transfer are
/// compiled into the same transaction, so they succeed or fail together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferUnit {
    /// The payout destination (owner of the receiving account).
    pub destination: Address,
    /// The amount to transfer.
    pub amount: Amount,
    /// Whether the destination's receiving account must be created first.
    pub create_account: bool,
}

/// Wire-level ledger operations required by the disbursement engine.
#[async_trait]
pub trait LedgerClient {
    /// Whether the destination's receiving account already exists.
    async fn account_exists(&self, destination: &Address) -> Result<bool>;

    /// Fetch a fresh reference hash. Called before every submission
    /// attempt; reusing a stale reference is a common transient failure.
    async fn fetch_fresh_reference(&self) -> Result<ReferenceHash>;

    /// Submit one transfer unit anchored to the given reference.
    async fn submit(&self, unit: &TransferUnit, reference: &ReferenceHash)
        -> Result<TxSignature>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_hash_base58_roundtrip() {
        let encoded = bs58::encode([7u8; 32]).into_string();
        let reference = ReferenceHash::from_base58(&encoded).expect("parse");
        assert_eq!(reference.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn test_reference_hash_rejects_wrong_length() {
        assert!(ReferenceHash::from_base58("abc").is_err());
    }

    #[test]
    fn test_reference_hash_rejects_bad_alphabet() {
        assert!(ReferenceHash::from_base58("0OIl").is_err());
    }
}
