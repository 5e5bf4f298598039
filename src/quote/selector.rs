//! Best-quote selection over the quoter's fee tiers

use super::Quote;
use crate::chain::ChainClient;
use crate::contracts::calls::{decode_quote_amount, quote_call};
use crate::contracts::ContractConfig;
use crate::error::HarvesterResult;
use crate::tx::{retry_rate_limited, RetryPolicy};

use ethers::types::U256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Queries every configured fee tier and keeps the largest output
pub struct QuoteSelector {
    quoter: ContractConfig,
    fee_tiers: Vec<u32>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl QuoteSelector {
    pub fn new(
        quoter: ContractConfig,
        fee_tiers: Vec<u32>,
        retry: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            quoter,
            fee_tiers,
            retry,
            shutdown,
        }
    }

    /// Best quote for selling `amount_in` of `token_in` (one whole token by
    /// default), or `None` when no tier has a pool with output.
    ///
    /// Tiers are queried in configured order; an equal output never displaces
    /// an earlier tier.
    pub async fn best_quote(
        &self,
        client: &dyn ChainClient,
        token_in: &ContractConfig,
        token_out: &ContractConfig,
        amount_in: Option<U256>,
    ) -> HarvesterResult<Option<Quote>> {
        let amount_in = amount_in.unwrap_or_else(|| token_in.one());
        let mut best: Option<Quote> = None;

        for &fee_tier in &self.fee_tiers {
            let query = quote_call(&self.quoter, token_in, token_out, amount_in, fee_tier).as_static_call();
            let response = retry_rate_limited(&self.retry, &self.shutdown, "quote", || {
                client.call(&query, None)
            })
            .await;

            let amount_out = match response.and_then(|data| decode_quote_amount(&data)) {
                Ok(amount_out) => amount_out,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!("No quote at fee tier {}: {}", fee_tier, e);
                    crate::metrics::record_quote_probe(fee_tier, false);
                    continue;
                }
            };

            crate::metrics::record_quote_probe(fee_tier, !amount_out.is_zero());
            if amount_out.is_zero() {
                debug!("Fee tier {} quoted zero output", fee_tier);
                continue;
            }

            let improves = best
                .as_ref()
                .map_or(true, |current| amount_out > current.amount_out);
            if improves {
                best = Some(Quote {
                    fee_tier,
                    amount_in,
                    amount_out,
                    rate: token_out.to_decimal(amount_out) / token_in.to_decimal(amount_in),
                });
            }
        }

        if let Some(ref quote) = best {
            info!(
                "Best quote {:?} -> {:?}: {} in, {} out at fee tier {} (rate {})",
                token_in.address,
                token_out.address,
                token_in.format(amount_in),
                token_out.format(quote.amount_out),
                quote.fee_tier,
                quote.rate
            );
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::contracts::bindings::uniswap::QuoteExactInputSingleCall;
    use crate::error::HarvesterError;
    use ethers::abi::{self, AbiDecode, Token};
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::{Address, Bytes};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn token(byte: u8, decimals: u8) -> ContractConfig {
        ContractConfig {
            address: Address::repeat_byte(byte),
            decimals,
        }
    }

    fn selector(fee_tiers: Vec<u32>) -> QuoteSelector {
        QuoteSelector::new(
            token(0x99, 0),
            fee_tiers,
            RetryPolicy::new(Duration::from_millis(1), None),
            CancellationToken::new(),
        )
    }

    fn fee_of(tx: &TypedTransaction) -> u32 {
        let data = tx.data().cloned().unwrap_or_default();
        QuoteExactInputSingleCall::decode(&data).unwrap().params.fee
    }

    fn quoted(amount_out: u64) -> Bytes {
        abi::encode(&[
            Token::Uint(U256::from(amount_out)),
            Token::Uint(U256::zero()),
            Token::Uint(U256::one()),
            Token::Uint(U256::from(90_000u64)),
        ])
        .into()
    }

    /// Quoter that answers per fee tier; absent tiers behave like a missing pool
    fn quoter(outputs: HashMap<u32, u64>) -> MockChainClient {
        let mut client = MockChainClient::new();
        client.expect_call().returning(move |tx, _| {
            match outputs.get(&fee_of(tx)) {
                Some(amount) => Ok(quoted(*amount)),
                None => Err(HarvesterError::ChainCall("eth_call: execution reverted".to_string())),
            }
        });
        client
    }

    #[tokio::test]
    async fn picks_tier_with_highest_output() {
        let client = quoter(HashMap::from([(500, 1_000_000), (3000, 1_500_000)]));

        let quote = selector(vec![500, 3000])
            .best_quote(&client, &token(0x01, 18), &token(0x02, 6), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(quote.fee_tier, 3000);
        assert_eq!(quote.amount_in, U256::exp10(18));
        assert_eq!(quote.amount_out, U256::from(1_500_000u64));
        assert_eq!(quote.rate, 1.5);
    }

    #[tokio::test]
    async fn missing_low_tier_pool_falls_through_to_next_tier() {
        let client = quoter(HashMap::from([(3000, 1_500_000)]));

        let quote = selector(vec![500, 3000])
            .best_quote(&client, &token(0x01, 18), &token(0x02, 6), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(quote.fee_tier, 3000);
        assert_eq!(quote.amount_out, U256::from(1_500_000u64));
        assert_eq!(quote.rate, 1.5);
    }

    #[tokio::test]
    async fn failing_tiers_are_skipped() {
        let client = quoter(HashMap::from([(500, 20), (10000, 35), (3000, 0)]));

        let quote = selector(vec![100, 500, 3000, 10000])
            .best_quote(&client, &token(0x01, 0), &token(0x02, 0), Some(U256::from(10u64)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(quote.fee_tier, 10000);
        assert_eq!(quote.amount_out, U256::from(35u64));
        assert_eq!(quote.rate, 3.5);
    }

    #[tokio::test]
    async fn ties_keep_the_earlier_tier() {
        let client = quoter(HashMap::from([(100, 50), (500, 50)]));

        let quote = selector(vec![100, 500])
            .best_quote(&client, &token(0x01, 0), &token(0x02, 0), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quote.fee_tier, 100);
    }

    #[tokio::test]
    async fn no_pools_means_no_quote() {
        let client = quoter(HashMap::new());

        let quote = selector(vec![100, 500, 3000, 10000])
            .best_quote(&client, &token(0x01, 18), &token(0x02, 6), None)
            .await
            .unwrap();
        assert!(quote.is_none());
    }

    #[tokio::test]
    async fn rate_limited_tier_is_retried_not_skipped() {
        let attempts = Arc::new(AtomicU32::new(0));
        let mut client = MockChainClient::new();
        client.expect_call().returning({
            let attempts = attempts.clone();
            move |tx, _| {
                if fee_of(tx) == 3000 && attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(HarvesterError::RateLimited {
                        operation: "eth_call".to_string(),
                        message: "429 Too Many Requests".to_string(),
                    });
                }
                Ok(quoted(if fee_of(tx) == 3000 { 900 } else { 100 }))
            }
        });

        let quote = selector(vec![500, 3000])
            .best_quote(&client, &token(0x01, 0), &token(0x02, 0), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(quote.fee_tier, 3000);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_tier_is_skipped() {
        let mut client = MockChainClient::new();
        client.expect_call().returning(|tx, _| {
            if fee_of(tx) == 500 {
                Err(HarvesterError::RateLimited {
                    operation: "eth_call".to_string(),
                    message: "over rate limit".to_string(),
                })
            } else {
                Ok(quoted(10))
            }
        });

        let selector = QuoteSelector::new(
            token(0x99, 0),
            vec![500, 3000],
            RetryPolicy::new(Duration::from_millis(1), Some(2)),
            CancellationToken::new(),
        );
        let quote = selector
            .best_quote(&client, &token(0x01, 0), &token(0x02, 0), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quote.fee_tier, 3000);
    }

    #[tokio::test]
    async fn shutdown_aborts_selection() {
        let shutdown = CancellationToken::new();
        let mut client = MockChainClient::new();
        client.expect_call().returning(|_, _| {
            Err(HarvesterError::RateLimited {
                operation: "eth_call".to_string(),
                message: "over rate limit".to_string(),
            })
        });

        let selector = QuoteSelector::new(token(0x99, 0), vec![500], RetryPolicy::default(), shutdown.clone());
        shutdown.cancel();
        let err = selector
            .best_quote(&client, &token(0x01, 0), &token(0x02, 0), None)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
