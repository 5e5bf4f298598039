//! Polling for on-chain state that lags behind a mined transaction
//!
//! Approvals, block height and balances are read through a single gate so
//! they share one poll interval, one optional deadline and the shutdown
//! signal.

use super::ChainClient;
use crate::contracts::calls::{allowance_call, balance_of_call, decode_uint};
use crate::contracts::ContractConfig;
use crate::error::{HarvesterError, HarvesterResult};
use crate::tx::{retry_rate_limited, RetryPolicy};

use ethers::types::{Address, U256};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Waits until reads reflect state the caller already expects
pub struct AllowanceGate {
    /// Pause between reads
    interval: Duration,
    /// Give up after this long; wait forever when `None`
    max_wait: Option<Duration>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl AllowanceGate {
    pub fn new(
        interval: Duration,
        max_wait: Option<Duration>,
        retry: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            interval,
            max_wait,
            retry,
            shutdown,
        }
    }

    /// Block until `allowance(owner, spender)` on `token` is at least `required`.
    pub async fn await_allowance(
        &self,
        client: &dyn ChainClient,
        token: &ContractConfig,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> HarvesterResult<U256> {
        let query = allowance_call(token, owner, spender).as_static_call();
        let started = Instant::now();

        loop {
            let data = retry_rate_limited(&self.retry, &self.shutdown, "allowance", || {
                client.call(&query, None)
            })
            .await?;
            let allowance = decode_uint(&data)?;

            if allowance >= required {
                info!(
                    "Allowance {:?} -> {:?} is {} (needed {})",
                    owner,
                    spender,
                    token.format(allowance),
                    token.format(required)
                );
                return Ok(allowance);
            }

            debug!(
                "Allowance {} below {}, polling again",
                token.format(allowance),
                token.format(required)
            );
            self.pause(started, "allowance").await?;
        }
    }

    /// Block until the chain head is at least `block`; returns the head.
    pub async fn wait_for_block(&self, client: &dyn ChainClient, block: u64) -> HarvesterResult<u64> {
        let started = Instant::now();

        loop {
            let head = retry_rate_limited(&self.retry, &self.shutdown, "block number", || {
                client.block_number()
            })
            .await?;

            if head >= block {
                return Ok(head);
            }

            debug!("Chain head {} behind block {}", head, block);
            self.pause(started, "block").await?;
        }
    }

    /// Balance of `owner`, read at `at_block` once the provider has caught up
    /// to it, or at the head otherwise.
    pub async fn balance_of(
        &self,
        client: &dyn ChainClient,
        token: &ContractConfig,
        owner: Address,
        at_block: Option<u64>,
    ) -> HarvesterResult<U256> {
        if let Some(block) = at_block {
            self.wait_for_block(client, block).await?;
        }

        let query = balance_of_call(token, owner).as_static_call();
        let data = retry_rate_limited(&self.retry, &self.shutdown, "balance", || {
            client.call(&query, at_block)
        })
        .await?;

        decode_uint(&data)
    }

    async fn pause(&self, started: Instant, target: &str) -> HarvesterResult<()> {
        if let Some(max_wait) = self.max_wait {
            if started.elapsed() >= max_wait {
                return Err(HarvesterError::Timeout {
                    operation: target.to_string(),
                });
            }
        }

        crate::metrics::record_poll(target);
        crate::shutdown::sleep(&self.shutdown, self.interval, target).await
    }
}
