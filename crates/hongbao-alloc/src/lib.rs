//! # hongbao-alloc
//!
//! The allocation engine: splits a fixed budget into a randomized vector of
//! per-recipient amounts whose sum equals the budget exactly, with a
//! guaranteed per-recipient minimum and a tunable variance parameter.
//!
//! ## Modules
//!
//! - [`split`] — the randomized exact-sum split

pub mod split;

pub use split::{allocate, MIN_GAMMA_SHAPE};

use hongbao_types::Amount;

/// Error types for allocation.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// The budget cannot cover the per-recipient minimum for every holder.
    #[error("cannot distribute {total} to {holders} holders ({holders} x {minimum} exceeds the budget)")]
    InsufficientBudget {
        /// Total budget.
        total: Amount,
        /// Number of holders.
        holders: usize,
        /// Per-recipient minimum.
        minimum: Amount,
    },

    /// The variance parameter is not a positive finite number.
    #[error("variance must be a positive finite number, got {variance}")]
    InvalidVariance {
        /// The rejected value.
        variance: f64,
    },
}

/// Convenience result type for allocation.
pub type Result<T> = std::result::Result<T, AllocError>;
