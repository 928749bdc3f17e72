//! Execution accounting.

use hongbao_types::Amount;

/// Accumulated counters for one disbursement run.
///
/// `skipped` (ceiling preflight) is deliberately distinct from `failed`
/// (ledger rejection or retry exhaustion): a skip is an engine safety
/// decision, not a ledger outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Transfers confirmed submitted.
    pub sent: usize,
    /// Transfers that failed fatally or exhausted retries.
    pub failed: usize,
    /// Transfers skipped by the ceiling preflight check.
    pub skipped: usize,
    /// Cumulative amount actually sent. Never exceeds the configured
    /// ceiling at any point in the run.
    pub cumulative_sent: Amount,
}

impl ExecutionReport {
    /// Whether sending `amount` on top of the running total would exceed
    /// `ceiling`. Overflow counts as exceeding.
    pub fn would_exceed(&self, amount: Amount, ceiling: Amount) -> bool {
        match self.cumulative_sent.checked_add(amount) {
            Some(next) => next > ceiling,
            None => true,
        }
    }

    /// Record a successful transfer.
    pub fn record_sent(&mut self, amount: Amount) {
        self.sent += 1;
        // The preflight check bounds the sum below the ceiling.
        self.cumulative_sent = self
            .cumulative_sent
            .checked_add(amount)
            .unwrap_or(self.cumulative_sent);
    }

    /// Record a fatal per-entry failure.
    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Record a ceiling skip.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }
}
