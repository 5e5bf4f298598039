//! Chain module - the account handle the harvester drives
//!
//! This module provides:
//! - `ChainClient`, the narrow async seam over a connected, signing account
//! - `WalletClient`, its ethers implementation over HTTP JSON-RPC
//! - Mnemonic wallet construction
//! - Polling helpers that wait for allowances, block height and balances

pub mod polling;
pub mod provider;
pub mod wallet;

pub use polling::AllowanceGate;
pub use provider::WalletClient;

use crate::error::HarvesterResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

#[cfg(test)]
use mockall::automock;

/// A connected account able to read chain state, estimate, sign and broadcast
///
/// Provider failures are returned already classified, so rate limiting comes
/// back as `HarvesterError::RateLimited` from every method.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address transactions are sent from
    fn address(&self) -> Address;

    /// Human-readable label for logs
    fn label(&self) -> String;

    /// Transaction count of `address` including pending transactions
    async fn pending_transaction_count(&self, address: Address) -> HarvesterResult<u64>;

    /// Current chain head
    async fn block_number(&self) -> HarvesterResult<u64>;

    /// Static call, at `block` when given or at the head otherwise
    async fn call(&self, tx: &TypedTransaction, block: Option<u64>) -> HarvesterResult<Bytes>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> HarvesterResult<U256>;

    /// Sign and broadcast; resolves with the hash once the node accepted it
    async fn send_transaction(&self, tx: &TypedTransaction) -> HarvesterResult<H256>;

    async fn transaction_receipt(&self, tx_hash: H256)
        -> HarvesterResult<Option<TransactionReceipt>>;
}
