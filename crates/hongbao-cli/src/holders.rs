//! Holder-source client.
//!
//! The holder list comes from a worker API: a JSON POST with the
//! collection identifier, answered by `{"success": bool, "holders": [..]}`.
//! Any failure here (transport, non-success flag, malformed body, invalid
//! or duplicate address) is fatal to the whole run.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Context;
use hongbao_types::Address;
use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker API response shape.
#[derive(Debug, Deserialize)]
pub struct HoldersResponse {
    /// Whether the worker considers the lookup successful.
    pub success: bool,
    /// Ordered unique holder addresses.
    #[serde(default)]
    pub holders: Vec<String>,
}

/// Fetch the holder list for a collection.
pub async fn fetch_holders(
    http: &reqwest::Client,
    worker_url: &str,
    collection_id: &str,
) -> anyhow::Result<Vec<Address>> {
    tracing::info!(collection_id, "fetching holders");

    let response = http
        .post(worker_url)
        .json(&serde_json::json!({ "collectionId": collection_id }))
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .context("holder source request failed")?
        .error_for_status()
        .context("holder source returned an error status")?;
    let body: HoldersResponse = response
        .json()
        .await
        .context("malformed holder source response")?;

    let holders = validate_holders(body)?;
    tracing::info!(count = holders.len(), "got unique holders");
    Ok(holders)
}

/// Validate the response body into an ordered list of unique addresses.
pub fn validate_holders(body: HoldersResponse) -> anyhow::Result<Vec<Address>> {
    anyhow::ensure!(body.success, "holder source returned success=false");

    let mut holders = Vec::with_capacity(body.holders.len());
    let mut seen = BTreeSet::new();
    for raw in &body.holders {
        let address: Address = raw
            .parse()
            .with_context(|| format!("invalid holder address '{raw}'"))?;
        anyhow::ensure!(seen.insert(address), "duplicate holder address {address}");
        holders.push(address);
    }
    Ok(holders)
}
