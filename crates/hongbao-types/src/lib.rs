//! # hongbao-types
//!
//! Shared domain types for the hongbao workspace: validated on-chain
//! addresses and exact minor-unit token amounts.
//!
//! All amount arithmetic in the workspace happens in integer micro-units
//! (see [`Amount`]); decimal strings only appear at the configuration and
//! display boundaries.

pub mod address;
pub mod amount;

pub use address::Address;
pub use amount::Amount;

/// Decimal places of the distributed asset (USDC layout).
pub const TOKEN_DECIMALS: u32 = 6;

/// Micro-units per whole token (10^TOKEN_DECIMALS).
pub const MICRO_UNITS_PER_TOKEN: u64 = 1_000_000;

/// Error types for address and amount handling.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The string is not a valid base58-encoded 32-byte address.
    #[error("invalid address '{input}': {reason}")]
    InvalidAddress {
        /// The offending input string.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The string is not a valid non-negative decimal amount.
    #[error("invalid amount '{input}': {reason}")]
    InvalidAmount {
        /// The offending input string.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Arithmetic overflow on an amount operation.
    #[error("amount arithmetic overflow")]
    AmountOverflow,
}

/// Convenience result type for type construction.
pub type Result<T> = std::result::Result<T, TypesError>;
