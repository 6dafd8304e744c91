use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use devnet_core::SmokeSettings;
use tracing::{info, warn};

use crate::account::parse_signer;
use crate::rpc::RpcClient;

/// A value transfer from a locally held key.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub signer: PrivateKeySigner,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
}

impl TransferRequest {
    /// Build from smoke-test settings: parses the key, recipient and ether amount.
    pub fn from_settings(settings: &SmokeSettings) -> Result<Self> {
        let signer = parse_signer(&settings.sender_key)?;
        let to = settings
            .recipient
            .parse::<Address>()
            .with_context(|| format!("invalid recipient address: {}", settings.recipient))?;
        let value = parse_ether(&settings.value_eth)
            .with_context(|| format!("invalid ether amount: {}", settings.value_eth))?;
        Ok(Self {
            signer,
            to,
            value,
            gas_limit: settings.gas_limit,
        })
    }

    pub fn from_address(&self) -> Address {
        self.signer.address()
    }
}

/// Sign a legacy (EIP-155) transfer and return the raw EIP-2718 bytes and hash.
pub fn sign_transfer(
    request: &TransferRequest,
    chain_id: u64,
    nonce: u64,
    gas_price: u128,
) -> Result<(Bytes, B256)> {
    let mut tx = TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price,
        gas_limit: request.gas_limit,
        to: TxKind::Call(request.to),
        value: request.value,
        input: Bytes::new(),
    };
    let signature = request
        .signer
        .sign_transaction_sync(&mut tx)
        .context("failed to sign transaction")?;
    let signed = tx.into_signed(signature);
    let hash = *signed.hash();
    let envelope = TxEnvelope::from(signed);
    Ok((Bytes::from(envelope.encoded_2718()), hash))
}

/// Fill chain id, nonce and gas price from the node, sign, and submit.
pub async fn send_transfer(client: &RpcClient, request: &TransferRequest) -> Result<B256> {
    let from = request.from_address();
    let chain_id = client.chain_id().await?;
    let nonce = client.transaction_count(from).await?;
    let gas_price = client.gas_price().await?;

    let (raw, local_hash) = sign_transfer(request, chain_id, nonce, gas_price)?;
    let tx_hash = client.send_raw_transaction(&raw).await?;
    if tx_hash != local_hash {
        warn!(%tx_hash, %local_hash, "node returned a different transaction hash");
    }
    info!(%from, to = %request.to, nonce, chain_id, %tx_hash, "transfer submitted");
    Ok(tx_hash)
}
