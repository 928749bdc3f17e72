//! Run orchestration: the full distribution flow and the mapping
//! verification mode.

use anyhow::Context;

use hongbao_alloc::allocate;
use hongbao_engine::{build_plan, disburse, DisbursePolicy, ExecutionReport, PlanEntry, PlanStats};
use hongbao_ledger::{tx::USDC_MINT, LedgerClient, RpcLedgerClient};
use hongbao_resolve::{resolve, AddressMapping, ResolvedRecipient};
use hongbao_types::{Address, Amount};

use crate::config::RunParams;
use crate::holders::fetch_holders;

/// Sanity cap on the per-holder amount in verification mode, in whole
/// tokens.
const VERIFY_AMOUNT_CAP_TOKENS: u64 = 1_000_000;

/// The default distribution run: fetch, resolve, allocate, then (unless
/// dry-run) disburse.
pub async fn run_airdrop(params: &RunParams) -> anyhow::Result<()> {
    tracing::info!(
        collection_id = %params.collection_id,
        total = %params.total,
        minimum = %params.minimum,
        dry_run = params.dry_run,
        variance = params.variance,
        max_retries = params.max_retries,
        delay_secs = params.inter_transfer_delay.as_secs_f64(),
        "starting randomized distribution"
    );

    let http = reqwest::Client::new();
    let holders = fetch_holders(&http, &params.worker_url, &params.collection_id).await?;
    anyhow::ensure!(!holders.is_empty(), "no holders found");

    if let Some(report) = distribute(params, &holders, || rpc_client(params)).await? {
        log_summary(&report, params.total);
    }
    Ok(())
}

/// The post-fetch pipeline: resolve, allocate, plan, then disburse through
/// a client built by `ledger_factory`. In dry-run mode the run ends at the
/// plan and the factory is never invoked, so no ledger client ever exists.
async fn distribute<L, F>(
    params: &RunParams,
    holders: &[Address],
    ledger_factory: F,
) -> anyhow::Result<Option<ExecutionReport>>
where
    L: LedgerClient + Sync,
    F: FnOnce() -> anyhow::Result<L>,
{
    let mapping = match &params.mapping_file {
        Some(path) => AddressMapping::load(path)?,
        None => AddressMapping::empty(),
    };
    let resolution = resolve(holders, &mapping);

    let amounts = allocate(
        params.total,
        holders.len(),
        params.minimum,
        params.variance,
        &mut rand::thread_rng(),
    )?;
    let plan = build_plan(&resolution.recipients, &amounts)?;
    log_plan(&plan);

    if params.dry_run {
        tracing::info!("[dry run] no transactions will be sent");
        return Ok(None);
    }

    let ledger = ledger_factory()?;
    let policy = DisbursePolicy {
        budget_ceiling: params.total,
        inter_transfer_delay: params.inter_transfer_delay,
        max_retries: params.max_retries,
    };
    Ok(Some(disburse(&plan, &policy, &ledger).await))
}

/// Mapping verification mode: send a fixed amount to every destination
/// that has a mapping entry matching a current holder. Ignores `dry_run`.
pub async fn verify_mapping(params: &RunParams, amount_str: &str) -> anyhow::Result<()> {
    let amount: Amount = amount_str.parse().context("verification amount")?;
    anyhow::ensure!(!amount.is_zero(), "verification amount must be positive");
    anyhow::ensure!(
        amount <= Amount::from_tokens(VERIFY_AMOUNT_CAP_TOKENS)?,
        "verification amount {amount} is unreasonably large"
    );

    let mapping_path = params
        .mapping_file
        .as_ref()
        .context("mapping_file is not configured, cannot verify mapping")?;
    let mapping = AddressMapping::load(mapping_path)?;
    anyhow::ensure!(!mapping.is_empty(), "address mapping is empty, nothing to verify");

    tracing::info!(
        per_holder = %amount,
        entries = mapping.len(),
        "mapping verification mode, dry_run is ignored"
    );

    let http = reqwest::Client::new();
    let holders = fetch_holders(&http, &params.worker_url, &params.collection_id).await?;
    anyhow::ensure!(!holders.is_empty(), "no holders found");

    let (pairs, absent) = intersect_mapping(&holders, &mapping);
    if !absent.is_empty() {
        tracing::warn!(
            entries = ?absent.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "mapping entries that are not current holders (skipped)"
        );
    }
    anyhow::ensure!(
        !pairs.is_empty(),
        "no mapping entries match current holders, nothing to send"
    );

    let total = amount
        .checked_mul(pairs.len() as u64)
        .context("verification total overflows")?;
    let amounts = vec![amount; pairs.len()];
    let plan = build_plan(&pairs, &amounts)?;
    log_plan(&plan);

    let ledger = rpc_client(params)?;
    let policy = DisbursePolicy {
        budget_ceiling: total,
        inter_transfer_delay: params.inter_transfer_delay,
        max_retries: params.max_retries,
    };
    let report = disburse(&plan, &policy, &ledger).await;
    log_summary(&report, total);
    Ok(())
}

/// Build the RPC ledger client from the configured credentials.
fn rpc_client(params: &RunParams) -> anyhow::Result<RpcLedgerClient> {
    let (rpc_url, keypair) = params.ledger_credentials()?;
    let ledger = RpcLedgerClient::new(rpc_url, keypair, USDC_MINT)?;
    tracing::info!(sender = %ledger.payer(), "ledger client ready");
    Ok(ledger)
}

/// Pair each mapping entry whose source is a current holder with its
/// destination, preserving mapping order; everything else is reported
/// back as absent.
fn intersect_mapping(
    holders: &[Address],
    mapping: &AddressMapping,
) -> (Vec<ResolvedRecipient>, Vec<Address>) {
    let holder_set: std::collections::BTreeSet<_> = holders.iter().copied().collect();
    let mut pairs = Vec::new();
    let mut absent = Vec::new();
    for (source, destination) in mapping.iter() {
        if holder_set.contains(source) {
            pairs.push(ResolvedRecipient {
                holder: *source,
                destination: *destination,
            });
        } else {
            absent.push(*source);
        }
    }
    (pairs, absent)
}

fn log_plan(plan: &[PlanEntry]) {
    let Some(stats) = PlanStats::from_plan(plan) else {
        return;
    };
    tracing::info!(
        entries = stats.count,
        total = %stats.total,
        min = %stats.min,
        max = %stats.max,
        mean = %stats.mean,
        "distribution plan"
    );
    for (index, entry) in plan.iter().enumerate() {
        if entry.holder == entry.destination {
            tracing::info!(
                position = index + 1,
                holder = %entry.holder,
                amount = %entry.amount,
                "plan entry"
            );
        } else {
            tracing::info!(
                position = index + 1,
                holder = %entry.holder,
                destination = %entry.destination,
                amount = %entry.amount,
                "plan entry (remapped)"
            );
        }
    }
}

fn log_summary(report: &ExecutionReport, total: Amount) {
    tracing::info!(
        sent = report.sent,
        failed = report.failed,
        skipped = report.skipped,
        cumulative = %report.cumulative_sent,
        budget = %total,
        "distribution complete"
    );
}
