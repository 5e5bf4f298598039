//! Transaction execution with nonce management and rate-limit retry

mod nonce;
mod retry;
mod sender;

pub use nonce::NonceTracker;
pub use retry::{retry_rate_limited, RetryPolicy};
pub use sender::{TransactionExecutor, TxOutcome};
