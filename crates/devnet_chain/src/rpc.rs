//! Minimal JSON-RPC 2.0 client for the node's HTTP endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result, bail};
use devnet_core::{DevnetError, validate_url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Parse a JSON-RPC hex quantity such as `"0x1a"`.
pub fn parse_quantity(raw: &str) -> Result<u128> {
    let digits = raw
        .strip_prefix("0x")
        .with_context(|| format!("quantity without 0x prefix: {raw}"))?;
    if digits.is_empty() {
        bail!("empty quantity: {raw}");
    }
    u128::from_str_radix(digits, 16).with_context(|| format!("invalid quantity: {raw}"))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP JSON-RPC client bound to one endpoint.
#[derive(Debug)]
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for `url`. Only `http`/`https` URLs are accepted.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !validate_url(&url) {
            bail!("invalid RPC URL: {url}");
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            url,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one call and decode its `result`.
    pub async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(method, id, url = %self.url, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method}: request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("{method}: HTTP {status}: {}", text.trim());
        }

        let decoded: RpcResponse<R> = response
            .json()
            .await
            .with_context(|| format!("{method}: malformed JSON-RPC response"))?;

        if let Some(err) = decoded.error {
            return Err(DevnetError::Rpc {
                code: err.code,
                message: err.message,
            }
            .into());
        }
        decoded
            .result
            .with_context(|| format!("{method}: response has neither result nor error"))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128> {
        let raw: String = self.request(method, params).await?;
        parse_quantity(&raw)
    }

    pub async fn client_version(&self) -> Result<String> {
        self.request("web3_clientVersion", json!([])).await
    }

    /// Whether the endpoint answers at all.
    pub async fn is_connected(&self) -> bool {
        match self.client_version().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "node not reachable");
                false
            }
        }
    }

    pub async fn net_listening(&self) -> Result<bool> {
        self.request("net_listening", json!([])).await
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id = self.quantity("eth_chainId", json!([])).await?;
        u64::try_from(id).context("chain id exceeds u64")
    }

    pub async fn block_number(&self) -> Result<u64> {
        let n = self.quantity("eth_blockNumber", json!([])).await?;
        u64::try_from(n).context("block number exceeds u64")
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request("eth_accounts", json!([])).await
    }

    pub async fn mining(&self) -> Result<bool> {
        self.request("eth_mining", json!([])).await
    }

    pub async fn gas_price(&self) -> Result<u128> {
        self.quantity("eth_gasPrice", json!([])).await
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn transaction_count(&self, address: Address) -> Result<u64> {
        let n = self
            .quantity(
                "eth_getTransactionCount",
                json!([address.to_checksum(None), "pending"]),
            )
            .await?;
        u64::try_from(n).context("nonce exceeds u64")
    }

    /// Submit an encoded signed transaction and return its hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let encoded = format!("0x{}", hex::encode(raw));
        self.request("eth_sendRawTransaction", json!([encoded])).await
    }

    /// Poll `eth_blockNumber` until the node answers or `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration, interval: Duration) -> Result<()> {
        let started = tokio::time::Instant::now();
        loop {
            match self.block_number().await {
                Ok(height) => {
                    debug!(height, elapsed_ms = started.elapsed().as_millis() as u64, "node ready");
                    return Ok(());
                }
                Err(e) if started.elapsed() >= timeout => {
                    warn!(error = %e, "node did not become ready");
                    bail!(
                        "node at {} not ready after {}s: {e}",
                        self.url,
                        timeout.as_secs()
                    );
                }
                Err(e) => {
                    debug!(error = %e, "node not ready yet");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
}
