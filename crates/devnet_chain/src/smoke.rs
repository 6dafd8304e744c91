use std::fmt;

use alloy::primitives::Address;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::rpc::RpcClient;

/// What the smoke test learned about the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmokeReport {
    pub url: String,
    pub connected: bool,
    pub client_version: Option<String>,
    /// Whether the node accepts peer connections (`net_listening`).
    pub listening: Option<bool>,
    pub chain_id: Option<u64>,
    pub block_number: Option<u64>,
    pub mining: Option<bool>,
    pub accounts: Vec<Address>,
}

/// Query connectivity, peer listening, chain id, height, mining flag and accounts.
///
/// An unreachable node is reported with `connected = false`, not as an error.
/// Once connected, any failing call is an error.
pub async fn run_report(client: &RpcClient) -> Result<SmokeReport> {
    let mut report = SmokeReport {
        url: client.url().to_string(),
        ..SmokeReport::default()
    };

    let version = match client.client_version().await {
        Ok(v) => v,
        Err(e) => {
            info!(url = %client.url(), error = %e, "node unreachable");
            return Ok(report);
        }
    };
    report.connected = true;
    report.client_version = Some(version);
    report.listening = Some(client.net_listening().await?);
    report.chain_id = Some(client.chain_id().await?);
    report.block_number = Some(client.block_number().await?);
    report.mining = Some(client.mining().await?);
    report.accounts = client.accounts().await?;

    info!(
        url = %report.url,
        block = ?report.block_number,
        accounts = report.accounts.len(),
        "smoke report collected"
    );
    Ok(report)
}

impl fmt::Display for SmokeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Endpoint:  {}", self.url)?;
        writeln!(f, "Connected: {}", self.connected)?;
        if !self.connected {
            return Ok(());
        }
        if let Some(ref v) = self.client_version {
            writeln!(f, "Client:    {v}")?;
        }
        if let Some(l) = self.listening {
            writeln!(f, "Listening: {l}")?;
        }
        if let Some(id) = self.chain_id {
            writeln!(f, "Chain ID:  {id}")?;
        }
        if let Some(n) = self.block_number {
            writeln!(f, "Block:     {n}")?;
        }
        if let Some(m) = self.mining {
            writeln!(f, "Mining:    {m}")?;
        }
        writeln!(f, "Accounts:  {}", self.accounts.len())?;
        for account in &self.accounts {
            writeln!(f, "  {account}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_result(server: &MockServer, rpc_method: &str, result: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn report_for_live_node() {
        let server = MockServer::start().await;
        mock_result(&server, "web3_clientVersion", json!("Geth/v1.13.8-stable/linux-amd64/go1.21.5")).await;
        mock_result(&server, "net_listening", json!(true)).await;
        mock_result(&server, "eth_chainId", json!("0xafca91a866fc")).await;
        mock_result(&server, "eth_blockNumber", json!("0x10")).await;
        mock_result(&server, "eth_mining", json!(true)).await;
        mock_result(
            &server,
            "eth_accounts",
            json!(["0xe136eaded3e05d98cefd285e82f173c3132703c5"]),
        )
        .await;

        let client = RpcClient::new(server.uri()).unwrap();
        let report = run_report(&client).await.unwrap();

        assert!(report.connected);
        assert_eq!(report.listening, Some(true));
        assert_eq!(report.chain_id, Some(193_284_561_987_324));
        assert_eq!(report.block_number, Some(16));
        assert_eq!(report.mining, Some(true));
        assert_eq!(report.accounts.len(), 1);

        let text = report.to_string();
        assert!(text.contains("Connected: true"));
        assert!(text.contains("Block:     16"));
        assert!(text.contains("Listening: true"));
        assert!(text.contains("0xe136eADEd3e05D98CeFd285E82F173C3132703C5"));
    }

    #[tokio::test]
    async fn unreachable_node_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = RpcClient::new(server.uri()).unwrap();
        let report = run_report(&client).await.unwrap();

        assert!(!report.connected);
        assert!(report.block_number.is_none());
        assert!(report.listening.is_none());
        assert!(report.accounts.is_empty());
        assert!(report.to_string().contains("Connected: false"));
    }
}
