// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM JSON-RPC client for reading mint receipts.

use alloy::{
    network::Ethereum,
    primitives::{Address, Log, B256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};

use super::token_id::TokenIdError;
use super::transfer::{find_mint, TransferLog};

/// HTTP provider type (with the recommended fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// A mint read from a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintReceipt {
    /// Account that sent the mint transaction
    pub sender: Address,
    pub transfer: TransferLog,
}

/// Read-only chain client.
pub struct ChainClient {
    chain_id: u64,
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a client for an arbitrary RPC endpoint.
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self, ChainClientError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self { chain_id, provider })
    }

    /// Read the receipt of a mint transaction and return its sender and
    /// validated Transfer.
    ///
    /// Fails if the transaction reverted, has no receipt yet, or the NFT
    /// contract's Transfer carries an invalid token id.
    pub async fn mint_token_id(
        &self,
        tx_hash: &str,
        nft_contract: Address,
    ) -> Result<MintReceipt, ChainClientError> {
        let hash: B256 = tx_hash
            .trim()
            .parse()
            .map_err(|_| ChainClientError::InvalidTxHash(tx_hash.to_string()))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))?
            .ok_or_else(|| ChainClientError::ReceiptNotFound(tx_hash.to_string()))?;

        if !receipt.status() {
            return Err(ChainClientError::TransactionReverted(tx_hash.to_string()));
        }

        let logs: Vec<Log> = receipt
            .inner
            .logs()
            .iter()
            .map(|log| log.inner.clone())
            .collect();

        let mint = find_mint(&logs, nft_contract)?
            .ok_or_else(|| ChainClientError::NoMintEvent(tx_hash.to_string()))?;

        tracing::info!(
            tx_hash = %hash,
            token_id = %mint.token_id,
            to = %mint.to,
            sender = %receipt.from,
            "Resolved mint from receipt"
        );
        Ok(MintReceipt {
            sender: receipt.from,
            transfer: mint,
        })
    }

    /// Check that the endpoint serves the configured chain and return its
    /// latest block (used by readiness checks).
    pub async fn check_endpoint(&self) -> Result<u64, ChainClientError> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))?;
        if chain_id != self.chain_id {
            return Err(ChainClientError::WrongChain {
                expected: self.chain_id,
                actual: chain_id,
            });
        }
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))
    }
}

/// Errors that can occur during chain reads.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC endpoint serves chain {actual}, expected {expected}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("Receipt not found for {0}")]
    ReceiptNotFound(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("No mint Transfer event in {0}")]
    NoMintEvent(String),

    #[error(transparent)]
    TokenId(#[from] TokenIdError),
}
