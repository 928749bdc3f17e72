//! Run configuration.
//!
//! Parameters are read from a flat TOML file and validated into an
//! immutable [`RunParams`] struct before anything else happens. Amounts
//! are decimal strings parsed exactly; no floating-point amount arithmetic
//! occurs anywhere downstream.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use hongbao_types::Amount;
use serde::Deserialize;

/// Raw configuration file shape.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    /// Holder-source worker endpoint.
    pub worker_url: String,
    /// Collection whose holders receive the distribution.
    pub collection_id: String,
    /// Total budget, decimal tokens (e.g. `"100.50"`).
    pub total_amount: String,
    /// Per-recipient minimum, decimal tokens.
    pub min_amount: String,
    /// Compute and report the plan without submitting anything.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// Ledger RPC endpoint. Required only when submitting.
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Base58-encoded secret key. Required only when submitting.
    #[serde(default)]
    pub keypair: Option<String>,
    /// Pause between consecutive transfers, in seconds.
    #[serde(default = "default_transfer_delay")]
    pub transfer_delay_secs: f64,
    /// Maximum submission attempts per transfer.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Optional address-override table (JSON file).
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
    /// Dirichlet concentration parameter for the random split.
    /// 1.0 = uniform simplex; lower = more uneven; higher = more even.
    #[serde(default = "default_variance")]
    pub variance: f64,
}

fn default_true() -> bool {
    true
}

fn default_transfer_delay() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    5
}

fn default_variance() -> f64 {
    1.0
}

/// Validated, immutable run parameters.
#[derive(Debug)]
pub struct RunParams {
    /// Holder-source worker endpoint.
    pub worker_url: String,
    /// Collection identifier.
    pub collection_id: String,
    /// Total budget.
    pub total: Amount,
    /// Per-recipient minimum.
    pub minimum: Amount,
    /// Plan-only mode.
    pub dry_run: bool,
    /// Ledger RPC endpoint, if configured.
    pub rpc_url: Option<String>,
    /// Base58-encoded secret key, if configured.
    pub keypair: Option<String>,
    /// Pause between consecutive transfers.
    pub inter_transfer_delay: Duration,
    /// Maximum submission attempts per transfer.
    pub max_retries: u32,
    /// Optional address-override table path.
    pub mapping_file: Option<PathBuf>,
    /// Dirichlet concentration parameter.
    pub variance: f64,
}

impl RunParams {
    /// Load and validate the configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        let raw: RawConfig = toml::from_str(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        Self::validate(raw)
    }

    /// Validate raw settings into typed parameters.
    pub fn validate(raw: RawConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!raw.worker_url.trim().is_empty(), "worker_url must not be empty");
        anyhow::ensure!(
            !raw.collection_id.trim().is_empty(),
            "collection_id must not be empty"
        );
        anyhow::ensure!(
            raw.variance.is_finite() && raw.variance > 0.0,
            "variance must be > 0, got {}",
            raw.variance
        );
        anyhow::ensure!(raw.max_retries >= 1, "max_retries must be at least 1");

        let total: Amount = raw.total_amount.parse().context("total_amount")?;
        let minimum: Amount = raw.min_amount.parse().context("min_amount")?;
        anyhow::ensure!(!total.is_zero(), "total_amount must be positive");

        let inter_transfer_delay = Duration::try_from_secs_f64(raw.transfer_delay_secs)
            .map_err(|_| anyhow::anyhow!("transfer_delay_secs must be a non-negative number"))?;

        Ok(Self {
            worker_url: raw.worker_url,
            collection_id: raw.collection_id,
            total,
            minimum,
            dry_run: raw.dry_run,
            rpc_url: raw.rpc_url,
            keypair: raw.keypair,
            inter_transfer_delay,
            max_retries: raw.max_retries,
            mapping_file: raw.mapping_file,
            variance: raw.variance,
        })
    }

    /// The RPC endpoint and signing key, required for any submitting mode.
    pub fn ledger_credentials(&self) -> anyhow::Result<(&str, &str)> {
        let rpc_url = self
            .rpc_url
            .as_deref()
            .context("rpc_url is required unless dry_run is set")?;
        let keypair = self
            .keypair
            .as_deref()
            .context("keypair is required unless dry_run is set")?;
        Ok((rpc_url, keypair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            worker_url = "https://worker.example/holders"
            collection_id = "my-collection"
            total_amount = "100"
            min_amount = "0.5"
        "#
    }

    #[test]
    fn test_defaults_applied() {
        let raw: RawConfig = toml::from_str(minimal_toml()).expect("parse");
        let params = RunParams::validate(raw).expect("validate");
        assert!(params.dry_run);
        assert_eq!(params.max_retries, 5);
        assert_eq!(params.inter_transfer_delay, Duration::from_secs(1));
        assert!((params.variance - 1.0).abs() < f64::EPSILON);
        assert_eq!(params.total.micro_units(), 100_000_000);
        assert_eq!(params.minimum.micro_units(), 500_000);
        assert!(params.mapping_file.is_none());
    }

    #[test]
    fn test_explicit_settings() {
        let toml_str = r#"
            worker_url = "https://worker.example/holders"
            collection_id = "my-collection"
            total_amount = "10.000001"
            min_amount = "0"
            dry_run = false
            rpc_url = "https://rpc.example"
            keypair = "base58secret"
            transfer_delay_secs = 0.25
            max_retries = 3
            variance = 0.2
        "#;
        let raw: RawConfig = toml::from_str(toml_str).expect("parse");
        let params = RunParams::validate(raw).expect("validate");
        assert!(!params.dry_run);
        assert_eq!(params.total.micro_units(), 10_000_001);
        assert_eq!(params.inter_transfer_delay, Duration::from_millis(250));
        assert_eq!(params.max_retries, 3);
        let (rpc_url, keypair) = params.ledger_credentials().expect("credentials");
        assert_eq!(rpc_url, "https://rpc.example");
        assert_eq!(keypair, "base58secret");
    }

    #[test]
    fn test_rejects_zero_variance() {
        let mut raw: RawConfig = toml::from_str(minimal_toml()).expect("parse");
        raw.variance = 0.0;
        assert!(RunParams::validate(raw).is_err());
    }

    #[test]
    fn test_rejects_zero_total() {
        let toml_str = r#"
            worker_url = "https://worker.example/holders"
            collection_id = "my-collection"
            total_amount = "0"
            min_amount = "0"
        "#;
        let raw: RawConfig = toml::from_str(toml_str).expect("parse");
        assert!(RunParams::validate(raw).is_err());
    }

    #[test]
    fn test_rejects_zero_retries() {
        let mut raw: RawConfig = toml::from_str(minimal_toml()).expect("parse");
        raw.max_retries = 0;
        assert!(RunParams::validate(raw).is_err());
    }

    #[test]
    fn test_rejects_negative_delay() {
        let mut raw: RawConfig = toml::from_str(minimal_toml()).expect("parse");
        raw.transfer_delay_secs = -1.0;
        assert!(RunParams::validate(raw).is_err());
    }

    #[test]
    fn test_rejects_inexact_amount() {
        let toml_str = r#"
            worker_url = "https://worker.example/holders"
            collection_id = "my-collection"
            total_amount = "1.0000005"
            min_amount = "0"
        "#;
        let raw: RawConfig = toml::from_str(toml_str).expect("parse");
        assert!(RunParams::validate(raw).is_err());
    }

    #[test]
    fn test_credentials_missing() {
        let raw: RawConfig = toml::from_str(minimal_toml()).expect("parse");
        let params = RunParams::validate(raw).expect("validate");
        assert!(params.ledger_credentials().is_err());
    }
}
