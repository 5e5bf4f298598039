//! Transaction executor with dry-run estimation and rate-limit retry

use super::nonce::NonceTracker;
use super::retry::{retry_rate_limited, RetryPolicy};
use crate::chain::ChainClient;
use crate::contracts::PreparedCall;
use crate::error::{HarvesterError, HarvesterResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{TransactionReceipt, H256, U256, U64};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of one executed call
#[derive(Debug, Clone, Serialize)]
pub enum TxOutcome {
    /// Gas was estimated; nothing was broadcast
    DryRun { estimated_gas: U256 },
    /// Broadcast and mined successfully
    Confirmed {
        tx_hash: H256,
        receipt: TransactionReceipt,
    },
}

impl TxOutcome {
    pub fn message(&self) -> String {
        match self {
            TxOutcome::DryRun { estimated_gas } => {
                format!("[DRY-RUN] Estimated gas: {}", estimated_gas)
            }
            TxOutcome::Confirmed { tx_hash, .. } => format!("{:?}", tx_hash),
        }
    }

    /// Block the transaction was mined in
    pub fn block_number(&self) -> Option<u64> {
        match self {
            TxOutcome::DryRun { .. } => None,
            TxOutcome::Confirmed { receipt, .. } => receipt.block_number.map(|b| b.as_u64()),
        }
    }
}

/// Stamps nonces onto prepared calls and estimates or submits them
pub struct TransactionExecutor {
    /// Shared per-address nonce cache
    nonces: Arc<NonceTracker>,
    /// Rate-limit retry behaviour
    retry: RetryPolicy,
    /// Pause between receipt lookups while waiting for inclusion
    receipt_poll_interval: Duration,
    shutdown: CancellationToken,
}

impl TransactionExecutor {
    pub fn new(
        nonces: Arc<NonceTracker>,
        retry: RetryPolicy,
        receipt_poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            nonces,
            retry,
            receipt_poll_interval,
            shutdown,
        }
    }

    /// Execute `call` from the client's account.
    ///
    /// A nonce is allocated before anything else so consecutive calls from
    /// one account keep their order. Once allocated, the same stamped
    /// transaction is reused for every retry; the nonce is never requested
    /// again for this call.
    pub async fn execute(
        &self,
        client: &dyn ChainClient,
        call: &PreparedCall,
        dry_run: bool,
    ) -> HarvesterResult<TxOutcome> {
        let from = client.address();
        let nonce = retry_rate_limited(&self.retry, &self.shutdown, "nonce allocation", || {
            self.nonces.allocate(client, from)
        })
        .await?;

        let tx = call.stamp(from, nonce);
        debug!(
            "Prepared tx from {} to {:?} with nonce {} (data 0x{})",
            client.label(),
            call.to,
            nonce,
            hex::encode(&call.data)
        );

        let result = if dry_run {
            let estimated_gas = retry_rate_limited(&self.retry, &self.shutdown, "gas estimation", || {
                client.estimate_gas(&tx)
            })
            .await;
            estimated_gas.map(|estimated_gas| {
                crate::metrics::record_tx_dry_run();
                TxOutcome::DryRun { estimated_gas }
            })
        } else {
            self.submit(client, &tx, nonce).await
        };

        if let Err(ref e) = result {
            let cached = self.nonces.current(from).await;
            error!(
                "Transaction from {} with nonce {} failed: {} (nonce cache stays at {:?})",
                client.label(),
                nonce,
                e,
                cached
            );
        }

        result
    }

    async fn submit(
        &self,
        client: &dyn ChainClient,
        tx: &TypedTransaction,
        nonce: u64,
    ) -> HarvesterResult<TxOutcome> {
        let tx_hash = retry_rate_limited(&self.retry, &self.shutdown, "broadcast", || {
            client.send_transaction(tx)
        })
        .await?;
        info!("Transaction sent from {}: {:?} (nonce {})", client.label(), tx_hash, nonce);

        let receipt = self.wait_for_receipt(client, tx_hash).await?;
        let block_number = receipt.block_number.map(|b| b.as_u64()).unwrap_or_default();

        if receipt.status != Some(U64::from(1)) {
            crate::metrics::record_tx_reverted();
            return Err(HarvesterError::Reverted {
                tx_hash: format!("{:?}", tx_hash),
                block_number,
            });
        }

        crate::metrics::record_tx_confirmed();
        info!("Transaction {:?} confirmed in block {}", tx_hash, block_number);
        Ok(TxOutcome::Confirmed { tx_hash, receipt })
    }

    /// Poll for the receipt with no deadline; only shutdown ends the wait early.
    async fn wait_for_receipt(
        &self,
        client: &dyn ChainClient,
        tx_hash: H256,
    ) -> HarvesterResult<TransactionReceipt> {
        loop {
            let receipt = retry_rate_limited(&self.retry, &self.shutdown, "receipt lookup", || {
                client.transaction_receipt(tx_hash)
            })
            .await?;

            match receipt {
                Some(receipt) if receipt.block_number.is_some() => return Ok(receipt),
                _ => {
                    crate::metrics::record_poll("receipt");
                    crate::shutdown::sleep(
                        &self.shutdown,
                        self.receipt_poll_interval,
                        "transaction confirmation",
                    )
                    .await?;
                }
            }
        }
    }
}
