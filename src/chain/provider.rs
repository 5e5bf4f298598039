//! Signing HTTP provider for a single wallet

use super::ChainClient;
use crate::config::NetworkConfig;
use crate::error::{HarvesterError, HarvesterResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A wallet bound to an HTTP JSON-RPC endpoint
pub struct WalletClient {
    /// Name from the configuration, used in logs
    name: String,
    /// Signing middleware over the HTTP provider
    client: Arc<SignerClient>,
}

impl WalletClient {
    /// Connect a wallet to the configured network
    pub fn connect(
        name: &str,
        wallet: LocalWallet,
        network: &NetworkConfig,
        poll_interval: Duration,
    ) -> HarvesterResult<Self> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| HarvesterError::Config(format!("Invalid RPC URL: {}", e)))?
            .interval(poll_interval);

        let wallet = wallet.with_chain_id(network.chain_id);
        debug!(
            "Connected wallet {} ({:?}) to {} (chain {})",
            name,
            wallet.address(),
            network.name,
            network.chain_id
        );

        Ok(Self {
            name: name.to_string(),
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
        })
    }
}

#[async_trait]
impl ChainClient for WalletClient {
    fn address(&self) -> Address {
        self.client.address()
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    async fn pending_transaction_count(&self, address: Address) -> HarvesterResult<u64> {
        let count = self
            .client
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| {
                HarvesterError::from_rpc("pending transaction count", e, HarvesterError::ChainCall)
            })?;

        Ok(count.as_u64())
    }

    async fn block_number(&self) -> HarvesterResult<u64> {
        self.client
            .get_block_number()
            .await
            .map(|block| block.as_u64())
            .map_err(|e| HarvesterError::from_rpc("block number", e, HarvesterError::ChainCall))
    }

    async fn call(&self, tx: &TypedTransaction, block: Option<u64>) -> HarvesterResult<Bytes> {
        let block = block.map(|number| BlockId::Number(BlockNumber::Number(number.into())));
        self.client
            .call(tx, block)
            .await
            .map_err(|e| HarvesterError::from_rpc("eth_call", e, HarvesterError::ChainCall))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> HarvesterResult<U256> {
        self.client
            .estimate_gas(tx, None)
            .await
            .map_err(|e| HarvesterError::from_rpc("gas estimation", e, HarvesterError::GasEstimation))
    }

    async fn send_transaction(&self, tx: &TypedTransaction) -> HarvesterResult<H256> {
        let pending = self
            .client
            .send_transaction(tx.clone(), None)
            .await
            .map_err(|e| HarvesterError::from_rpc("broadcast", e, HarvesterError::Transaction))?;

        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> HarvesterResult<Option<TransactionReceipt>> {
        self.client
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| HarvesterError::from_rpc("receipt lookup", e, HarvesterError::ChainCall))
    }
}
