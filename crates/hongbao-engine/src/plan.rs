//! Disbursement plan construction.
//!
//! The plan is built up front, positionally combining resolver output with
//! allocator output, and never streamed: both inputs must be complete
//! before any transfer is attempted.

use hongbao_resolve::ResolvedRecipient;
use hongbao_types::{Address, Amount};

use crate::{EngineError, Result};

/// One planned transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanEntry {
    /// The original reward-eligible holder.
    pub holder: Address,
    /// The resolved payout destination.
    pub destination: Address,
    /// The allocated amount.
    pub amount: Amount,
}

/// Summary statistics of a plan, for the run report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanStats {
    /// Number of entries.
    pub count: usize,
    /// Sum of all allocated amounts.
    pub total: Amount,
    /// Smallest allocated amount.
    pub min: Amount,
    /// Largest allocated amount.
    pub max: Amount,
    /// Mean allocated amount (floor of total / count in micro-units).
    pub mean: Amount,
}

/// Combine resolver and allocator output positionally into a plan.
///
/// # Errors
///
/// - [`EngineError::PlanMismatch`] if the two sequences differ in length
pub fn build_plan(
    recipients: &[ResolvedRecipient],
    amounts: &[Amount],
) -> Result<Vec<PlanEntry>> {
    if recipients.len() != amounts.len() {
        return Err(EngineError::PlanMismatch {
            recipients: recipients.len(),
            amounts: amounts.len(),
        });
    }
    Ok(recipients
        .iter()
        .zip(amounts)
        .map(|(recipient, amount)| PlanEntry {
            holder: recipient.holder,
            destination: recipient.destination,
            amount: *amount,
        })
        .collect())
}

impl PlanStats {
    /// Compute stats over a plan. Returns `None` for an empty plan.
    pub fn from_plan(plan: &[PlanEntry]) -> Option<Self> {
        if plan.is_empty() {
            return None;
        }
        let total: Amount = plan.iter().map(|e| e.amount).sum();
        let min = plan.iter().map(|e| e.amount).min()?;
        let max = plan.iter().map(|e| e.amount).max()?;
        let mean = Amount::from_micro_units(total.micro_units() / plan.len() as u64);
        Some(Self {
            count: plan.len(),
            total,
            min,
            max,
            mean,
        })
    }
}
