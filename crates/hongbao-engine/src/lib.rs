//! # hongbao-engine
//!
//! The disbursement engine: consumes an ordered plan of (holder,
//! destination, amount) entries and executes them as sequential on-chain
//! transfers with classified retry, a hard cumulative-spend ceiling, and
//! partial-failure accounting.
//!
//! Execution is intentionally single-threaded: the ceiling check and the
//! cumulative-sent accounting assume strict entry ordering, and no two
//! transfers are ever in flight at once.
//!
//! ## Modules
//!
//! - [`plan`] — plan construction and summary statistics
//! - [`report`] — the execution report
//! - [`disburse`] — the per-entry state machine and retry policy

pub mod disburse;
pub mod plan;
pub mod report;

pub use disburse::{
    disburse, DisbursePolicy, EntryOutcome, RATE_LIMIT_BACKOFF_STEP, STALE_REFERENCE_DELAY,
};
pub use plan::{build_plan, PlanEntry, PlanStats};
pub use report::ExecutionReport;

/// Error types for plan construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Resolver output and allocator output differ in length.
    #[error("plan mismatch: {recipients} resolved recipients but {amounts} allocated amounts")]
    PlanMismatch {
        /// Number of resolved recipients.
        recipients: usize,
        /// Number of allocated amounts.
        amounts: usize,
    },
}

/// Convenience result type for the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
