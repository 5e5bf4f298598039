//! Error types for the harvester

use thiserror::Error;

/// Main error type for the harvester
#[derive(Error, Debug)]
pub enum HarvesterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited during {operation}: {message}")]
    RateLimited { operation: String, message: String },

    #[error("Chain call failed: {0}")]
    ChainCall(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Transaction {tx_hash} reverted in block {block_number}")]
    Reverted { tx_hash: String, block_number: u64 },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Cancelled while waiting for {operation}")]
    Cancelled { operation: String },

    #[error("Gave up on {operation} after {attempts} rate-limited attempts: {message}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarvesterError {
    /// Only provider rate limiting is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HarvesterError::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HarvesterError::Cancelled { .. })
    }

    /// Classify a provider/middleware failure.
    ///
    /// Rate limiting surfaces differently per RPC vendor (JSON-RPC error body,
    /// HTTP 429, compute-unit messages), so the rendered message is inspected.
    /// Everything else is wrapped by `fallback`.
    pub fn from_rpc(
        operation: &str,
        err: impl std::fmt::Display,
        fallback: fn(String) -> HarvesterError,
    ) -> Self {
        let message = err.to_string();
        if is_rate_limit_message(&message) {
            HarvesterError::RateLimited {
                operation: operation.to_string(),
                message,
            }
        } else {
            fallback(format!("{}: {}", operation, message))
        }
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "rate limit",
        "too many requests",
        "exceeded its compute units",
        "status code 429",
        "429 too many",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Result type for harvester operations
pub type HarvesterResult<T> = Result<T, HarvesterError>;
