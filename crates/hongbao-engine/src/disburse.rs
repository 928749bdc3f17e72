//! The per-entry disbursement state machine.
//!
//! Each plan entry moves through preflight → prepare → submit and ends in
//! one of three terminal states: `Sent`, `Skipped` (ceiling preflight), or
//! `Failed` (fatal ledger error or retry exhaustion). A failure never
//! aborts the run; subsequent entries are still attempted.
//!
//! ## Retry policy
//!
//! A fresh reference hash is fetched before every submission attempt.
//! Transient failures are retried: a stale reference waits a fixed
//! [`STALE_REFERENCE_DELAY`], rate limiting waits
//! [`RATE_LIMIT_BACKOFF_STEP`] times the attempt number. Anything else is
//! fatal for the entry immediately.

use std::time::Duration;

use tokio::time::sleep;

use hongbao_ledger::{LedgerClient, LedgerError, TransferUnit, TxSignature};
use hongbao_types::Amount;

use crate::plan::PlanEntry;
use crate::report::ExecutionReport;

/// Fixed wait after a stale-reference failure.
pub const STALE_REFERENCE_DELAY: Duration = Duration::from_secs(2);

/// Per-attempt backoff step when rate limited (linear: step × attempt).
pub const RATE_LIMIT_BACKOFF_STEP: Duration = Duration::from_secs(3);

/// Run parameters of the disbursement loop.
#[derive(Clone, Copy, Debug)]
pub struct DisbursePolicy {
    /// Hard cap on cumulative spend for the run.
    pub budget_ceiling: Amount,
    /// Pause between consecutive entries (not after the last).
    pub inter_transfer_delay: Duration,
    /// Maximum submission attempts per entry.
    pub max_retries: u32,
}

/// Terminal state of one plan entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Submitted; carries the transaction identifier.
    Sent(TxSignature),
    /// Skipped by the ceiling preflight check.
    Skipped,
    /// Fatal ledger error or retry exhaustion.
    Failed(LedgerError),
}

/// Execute the plan strictly in order and return the aggregated report.
///
/// The run always completes with a report, even when entries fail; only
/// the caller's configuration and allocation stages may abort a run.
pub async fn disburse<L: LedgerClient + Sync>(
    plan: &[PlanEntry],
    policy: &DisbursePolicy,
    ledger: &L,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for (index, entry) in plan.iter().enumerate() {
        tracing::info!(
            position = index + 1,
            total = plan.len(),
            holder = %entry.holder,
            destination = %entry.destination,
            amount = %entry.amount,
            "processing transfer"
        );

        match process_entry(entry, &report, policy, ledger).await {
            EntryOutcome::Sent(signature) => {
                report.record_sent(entry.amount);
                tracing::info!(
                    %signature,
                    cumulative = %report.cumulative_sent,
                    "transfer sent"
                );
            }
            EntryOutcome::Skipped => {
                report.record_skipped();
            }
            EntryOutcome::Failed(error) => {
                report.record_failed();
                tracing::error!(holder = %entry.holder, %error, "transfer failed");
            }
        }

        if index + 1 < plan.len() {
            sleep(policy.inter_transfer_delay).await;
        }
    }

    report
}

/// Drive one entry to its terminal state. Does not mutate the report.
async fn process_entry<L: LedgerClient + Sync>(
    entry: &PlanEntry,
    report: &ExecutionReport,
    policy: &DisbursePolicy,
    ledger: &L,
) -> EntryOutcome {
    // Preflight: never authorize a transfer that would push cumulative
    // spend past the ceiling.
    if report.would_exceed(entry.amount, policy.budget_ceiling) {
        tracing::warn!(
            holder = %entry.holder,
            amount = %entry.amount,
            cumulative = %report.cumulative_sent,
            ceiling = %policy.budget_ceiling,
            "skipping transfer: would exceed budget ceiling"
        );
        return EntryOutcome::Skipped;
    }

    // Prepare: the receiving account's existence decides whether account
    // creation is bundled into the submission unit.
    let exists = match ledger.account_exists(&entry.destination).await {
        Ok(exists) => exists,
        Err(error) => return EntryOutcome::Failed(error),
    };
    let unit = TransferUnit {
        destination: entry.destination,
        amount: entry.amount,
        create_account: !exists,
    };

    // Submit with bounded, classified retry.
    let mut last_error = None;
    for attempt in 1..=policy.max_retries {
        let result = async {
            let reference = ledger.fetch_fresh_reference().await?;
            ledger.submit(&unit, &reference).await
        }
        .await;

        let error = match result {
            Ok(signature) => return EntryOutcome::Sent(signature),
            Err(error) => error,
        };

        if matches!(error, LedgerError::Other(_)) {
            return EntryOutcome::Failed(error);
        }

        last_error = Some(error.clone());
        if attempt == policy.max_retries {
            break;
        }
        match error {
            LedgerError::StaleReference => {
                tracing::warn!(
                    attempt,
                    max = policy.max_retries,
                    "stale reference, retrying after fixed delay"
                );
                sleep(STALE_REFERENCE_DELAY).await;
            }
            LedgerError::RateLimited => {
                let wait = RATE_LIMIT_BACKOFF_STEP * attempt;
                tracing::warn!(
                    attempt,
                    max = policy.max_retries,
                    wait_secs = wait.as_secs(),
                    "rate limited, backing off"
                );
                sleep(wait).await;
            }
            LedgerError::Other(_) => {}
        }
    }

    EntryOutcome::Failed(
        last_error.unwrap_or_else(|| LedgerError::Other("no submission attempts made".to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use hongbao_ledger::ReferenceHash;
    use hongbao_types::{Address, Amount};

    fn micro(m: u64) -> Amount {
        Amount::from_micro_units(m)
    }

    fn address(tag: u8) -> Address {
        let mut bytes = [0u8; 32];
        bytes[0] = tag;
        Address::new(bytes)
    }

    fn entry(tag: u8, amount: u64) -> PlanEntry {
        PlanEntry {
            holder: address(tag),
            destination: address(tag),
            amount: micro(amount),
        }
    }

    fn policy(ceiling: u64) -> DisbursePolicy {
        DisbursePolicy {
            budget_ceiling: micro(ceiling),
            inter_transfer_delay: Duration::from_secs(1),
            max_retries: 5,
        }
    }

    /// Scripted ledger: pops one submit result per attempt and counts calls.
    struct MockLedger {
        account_exists: bool,
        submit_script: Mutex<VecDeque<Result<TxSignature, LedgerError>>>,
        account_checks: AtomicUsize,
        reference_fetches: AtomicUsize,
        submit_calls: AtomicUsize,
    }

    impl MockLedger {
        fn new(
            account_exists: bool,
            script: impl IntoIterator<Item = Result<TxSignature, LedgerError>>,
        ) -> Self {
            Self {
                account_exists,
                submit_script: Mutex::new(script.into_iter().collect()),
                account_checks: AtomicUsize::new(0),
                reference_fetches: AtomicUsize::new(0),
                submit_calls: AtomicUsize::new(0),
            }
        }

        fn always_ok() -> Self {
            Self::new(true, std::iter::repeat_with(|| Ok("sig".to_string())).take(64))
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        async fn account_exists(&self, _destination: &Address) -> Result<bool, LedgerError> {
            self.account_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.account_exists)
        }

        async fn fetch_fresh_reference(&self) -> Result<ReferenceHash, LedgerError> {
            self.reference_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(ReferenceHash::new([0u8; 32]))
        }

        async fn submit(
            &self,
            _unit: &TransferUnit,
            _reference: &ReferenceHash,
        ) -> Result<TxSignature, LedgerError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            self.submit_script
                .lock()
                .expect("mock lock")
                .pop_front()
                .unwrap_or_else(|| Err(LedgerError::Other("script exhausted".to_string())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_entries_sent() {
        let ledger = MockLedger::always_ok();
        let plan = vec![entry(1, 30), entry(2, 30), entry(3, 40)];
        let report = disburse(&plan, &policy(100), &ledger).await;

        assert_eq!(report.sent, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.cumulative_sent, micro(100));
        // One reference per successful attempt.
        assert_eq!(ledger.reference_fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reference_retried_to_success() {
        let ledger = MockLedger::new(
            true,
            [
                Err(LedgerError::StaleReference),
                Err(LedgerError::StaleReference),
                Ok("sig".to_string()),
            ],
        );
        let plan = vec![entry(1, 10)];
        let report = disburse(&plan, &policy(100), &ledger).await;

        // One Sent outcome, not three.
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.cumulative_sent, micro(10));
        // A fresh reference was fetched for every attempt.
        assert_eq!(ledger.reference_fetches.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_fails_entry() {
        let ledger = MockLedger::new(
            true,
            std::iter::repeat_with(|| Err(LedgerError::RateLimited)).take(5),
        );
        let plan = vec![entry(1, 10)];
        let report = disburse(&plan, &policy(100), &ledger).await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cumulative_sent, Amount::ZERO);
        assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_aborts_retry_loop() {
        let ledger = MockLedger::new(
            true,
            [
                Err(LedgerError::Other("insufficient funds".to_string())),
                Ok("sig".to_string()),
            ],
        );
        let plan = vec![entry(1, 10), entry(2, 10)];
        let report = disburse(&plan, &policy(100), &ledger).await;

        // Entry 1 fails on its first attempt without retries; entry 2 is
        // still attempted and succeeds.
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(report.cumulative_sent, micro(10));
        assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_skips_offending_entry() {
        let ledger = MockLedger::always_ok();
        // 60 + 50 would breach the ceiling of 100; 30 still fits after.
        let plan = vec![entry(1, 60), entry(2, 50), entry(3, 30)];
        let report = disburse(&plan, &policy(100), &ledger).await;

        assert_eq!(report.sent, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.cumulative_sent, micro(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_entry_never_reaches_ledger() {
        let ledger = MockLedger::always_ok();
        let plan = vec![entry(1, 200)];
        let report = disburse(&plan, &policy(100), &ledger).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(ledger.account_checks.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_check_failure_is_per_entry_fatal() {
        struct FailingCheck;

        #[async_trait]
        impl LedgerClient for FailingCheck {
            async fn account_exists(&self, _d: &Address) -> Result<bool, LedgerError> {
                Err(LedgerError::Other("node unavailable".to_string()))
            }
            async fn fetch_fresh_reference(&self) -> Result<ReferenceHash, LedgerError> {
                Ok(ReferenceHash::new([0u8; 32]))
            }
            async fn submit(
                &self,
                _u: &TransferUnit,
                _r: &ReferenceHash,
            ) -> Result<TxSignature, LedgerError> {
                Ok("sig".to_string())
            }
        }

        let plan = vec![entry(1, 10)];
        let report = disburse(&plan, &policy(100), &FailingCheck).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_account_requests_creation() {
        struct CaptureUnit {
            created: Mutex<Vec<bool>>,
        }

        #[async_trait]
        impl LedgerClient for CaptureUnit {
            async fn account_exists(&self, _d: &Address) -> Result<bool, LedgerError> {
                Ok(false)
            }
            async fn fetch_fresh_reference(&self) -> Result<ReferenceHash, LedgerError> {
                Ok(ReferenceHash::new([0u8; 32]))
            }
            async fn submit(
                &self,
                unit: &TransferUnit,
                _r: &ReferenceHash,
            ) -> Result<TxSignature, LedgerError> {
                self.created.lock().expect("lock").push(unit.create_account);
                Ok("sig".to_string())
            }
        }

        let ledger = CaptureUnit {
            created: Mutex::new(Vec::new()),
        };
        let plan = vec![entry(1, 10)];
        let report = disburse(&plan, &policy(100), &ledger).await;
        assert_eq!(report.sent, 1);
        assert_eq!(*ledger.created.lock().expect("lock"), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_plan_yields_empty_report() {
        let ledger = MockLedger::always_ok();
        let report = disburse(&[], &policy(100), &ledger).await;
        assert_eq!(report, ExecutionReport::default());
    }
}
