//! Solana JSON-RPC ledger client.
//!
//! Implements [`LedgerClient`] over a JSON-RPC 2.0 HTTP endpoint with
//! confirmed commitment. Error classification (stale reference vs. rate
//! limiting vs. anything else) happens here, so callers only ever see the
//! typed [`LedgerError`] taxonomy.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::SigningKey;
use zeroize::Zeroize;

use hongbao_types::Address;

use crate::client::{LedgerClient, ReferenceHash, TransferUnit, TxSignature};
use crate::tx;
use crate::{LedgerError, Result};

/// A [`LedgerClient`] backed by a Solana JSON-RPC endpoint.
pub struct RpcLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    signing_key: SigningKey,
    payer: Address,
    mint: Address,
    source_account: Address,
}

impl RpcLedgerClient {
    /// Construct a client from a base58-encoded secret key.
    ///
    /// Accepts the common 64-byte keypair encoding (secret followed by
    /// public key) or a bare 32-byte secret. The decoded secret bytes are
    /// zeroized after the signing key is constructed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Other`] if the key does not decode to 32 or 64 bytes
    pub fn new(rpc_url: impl Into<String>, secret_key_base58: &str, mint: Address) -> Result<Self> {
        let mut decoded = bs58::decode(secret_key_base58)
            .into_vec()
            .map_err(|e| LedgerError::Other(format!("invalid base58 secret key: {e}")))?;
        let secret: std::result::Result<[u8; 32], _> = match decoded.len() {
            32 | 64 => decoded[..32].try_into(),
            n => {
                decoded.zeroize();
                return Err(LedgerError::Other(format!(
                    "secret key must be 32 or 64 bytes, got {n}"
                )));
            }
        };
        let mut secret = secret.map_err(|_| LedgerError::Other("malformed secret key".into()))?;
        decoded.zeroize();
        let signing_key = SigningKey::from_bytes(&secret);
        secret.zeroize();

        let payer = Address::new(signing_key.verifying_key().to_bytes());
        let source_account = tx::derive_associated_token_account(&payer, &mint)?;

        Ok(Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            signing_key,
            payer,
            mint,
            source_account,
        })
    }

    /// The sender address derived from the signing key.
    pub fn payer(&self) -> Address {
        self.payer
    }

    /// The asset mint this client transfers.
    pub fn mint(&self) -> Address {
        self.mint
    }

    async fn rpc_call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LedgerError::RateLimited);
        }
        let response = response.error_for_status().map_err(classify_transport_error)?;
        let value: serde_json::Value = response.json().await.map_err(classify_transport_error)?;

        if let Some(error) = value.get("error") {
            return Err(classify_rpc_error(error));
        }
        value
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Other(format!("{method}: response has no result")))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn account_exists(&self, destination: &Address) -> Result<bool> {
        let account = tx::derive_associated_token_account(destination, &self.mint)?;
        let result = self
            .rpc_call(
                "getAccountInfo",
                serde_json::json!([
                    account.to_string(),
                    { "encoding": "base64", "commitment": "confirmed" },
                ]),
            )
            .await?;
        Ok(!result
            .get("value")
            .map(serde_json::Value::is_null)
            .unwrap_or(true))
    }

    async fn fetch_fresh_reference(&self) -> Result<ReferenceHash> {
        let result = self
            .rpc_call(
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": "confirmed" }]),
            )
            .await?;
        let blockhash = result
            .pointer("/value/blockhash")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                LedgerError::Other("getLatestBlockhash: response has no blockhash".to_string())
            })?;
        ReferenceHash::from_base58(blockhash)
    }

    async fn submit(
        &self,
        unit: &TransferUnit,
        reference: &ReferenceHash,
    ) -> Result<TxSignature> {
        let destination_account =
            tx::derive_associated_token_account(&unit.destination, &self.mint)?;

        let mut instructions = Vec::with_capacity(2);
        if unit.create_account {
            tracing::info!(destination = %unit.destination, "bundling receiving-account creation");
            instructions.push(tx::create_associated_token_account(
                &self.payer,
                &unit.destination,
                &self.mint,
                &destination_account,
            ));
        }
        instructions.push(tx::spl_transfer(
            &self.source_account,
            &destination_account,
            &self.payer,
            unit.amount,
        ));

        let message = tx::compile_message(&self.payer, &instructions, reference)?;
        let transaction = tx::sign_transaction(&message, &self.signing_key);

        let result = self
            .rpc_call(
                "sendTransaction",
                serde_json::json!([
                    BASE64.encode(&transaction),
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": "confirmed",
                    },
                ]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LedgerError::Other("sendTransaction: malformed signature".to_string()))
    }
}

/// Classify an HTTP transport error.
fn classify_transport_error(error: reqwest::Error) -> LedgerError {
    if error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
        LedgerError::RateLimited
    } else {
        LedgerError::Other(error.to_string())
    }
}

/// Classify a JSON-RPC error object into the typed taxonomy.
fn classify_rpc_error(error: &serde_json::Value) -> LedgerError {
    let code = error.get("code").and_then(serde_json::Value::as_i64);
    let message = error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown RPC error");
    let lowered = message.to_lowercase();

    if lowered.contains("blockhash not found") || message.contains("BlockhashNotFound") {
        LedgerError::StaleReference
    } else if lowered.contains("too many requests") || message.contains("429") {
        LedgerError::RateLimited
    } else {
        match code {
            Some(code) => LedgerError::Other(format!("rpc error {code}: {message}")),
            None => LedgerError::Other(format!("rpc error: {message}")),
        }
    }
}
