//! # hongbao-ledger
//!
//! The ledger client boundary: a typed contract for account checks,
//! reference-hash fetching, and atomic transfer submission, plus the
//! concrete Solana JSON-RPC implementation.
//!
//! Failure classification happens here, once, at the wire boundary. The
//! disbursement engine only ever matches on [`LedgerError`] variants and
//! never inspects free-text error messages.
//!
//! ## Modules
//!
//! - [`client`] — the [`LedgerClient`] trait and submission types
//! - [`tx`] — instruction building, account derivation, message encoding
//! - [`rpc`] — the JSON-RPC implementation

pub mod client;
pub mod rpc;
pub mod tx;

pub use client::{LedgerClient, ReferenceHash, TransferUnit, TxSignature};
pub use rpc::RpcLedgerClient;

/// Error taxonomy of the ledger boundary.
///
/// `StaleReference` and `RateLimited` are transient and retryable; every
/// other failure is `Other` and treated as fatal for the affected transfer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The reference hash expired before the submission landed.
    #[error("reference hash expired before submission landed")]
    StaleReference,

    /// The endpoint is throttling requests.
    #[error("ledger endpoint is rate limiting requests")]
    RateLimited,

    /// Any other ledger failure; not retryable.
    #[error("ledger error: {0}")]
    Other(String),
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
