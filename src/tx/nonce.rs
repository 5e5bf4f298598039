//! Nonce allocation for sequential transaction submission
//!
//! Handles:
//! - Lazy per-address initialisation from the chain's pending count
//! - Local increments so dependent transactions never reuse a nonce
//!
//! The cache is authoritative once seeded. It is not reconciled with the
//! chain when a transaction fails after its nonce was handed out; a restart
//! re-derives the base.

use crate::chain::ChainClient;
use crate::error::HarvesterResult;

use dashmap::DashMap;
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Last nonce handed out, `None` until the chain has been asked
type NonceSlot = Arc<Mutex<Option<u64>>>;

/// Hands out contiguous nonces per address
#[derive(Default)]
pub struct NonceTracker {
    slots: DashMap<Address, NonceSlot>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next nonce for `address`.
    ///
    /// The first call per address reads the pending transaction count; later
    /// calls add one to the previous result. Allocations for one address are
    /// serialised, other addresses never wait on each other. A failed read
    /// leaves the slot unseeded so the next call asks the chain again.
    pub async fn allocate(&self, client: &dyn ChainClient, address: Address) -> HarvesterResult<u64> {
        // Clone the slot out so the map shard is not held across the await
        let slot = self.slots.entry(address).or_default().clone();
        let mut last = slot.lock().await;

        let nonce = match *last {
            Some(previous) => previous + 1,
            None => {
                let pending = client.pending_transaction_count(address).await?;
                debug!("Seeded nonce for {:?} from pending count {}", address, pending);
                pending
            }
        };

        *last = Some(nonce);
        debug!("Allocated nonce {} for {:?}", nonce, address);
        Ok(nonce)
    }

    /// Last nonce handed out for `address`
    pub async fn current(&self, address: Address) -> Option<u64> {
        let slot = self.slots.get(&address)?.clone();
        let last = slot.lock().await;
        *last
    }
}
