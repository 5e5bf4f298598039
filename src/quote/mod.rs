//! Price discovery across AMM fee tiers

mod selector;

pub use selector::QuoteSelector;

use crate::error::{HarvesterError, HarvesterResult};

use ethers::types::{U256, U512};
use serde::Serialize;

const BPS_DENOMINATOR: u64 = 10_000;

/// Output of a single-pool exact-input quote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    /// Pool fee in hundredths of a basis point
    pub fee_tier: u32,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Output per input in whole-token units
    pub rate: f64,
}

impl Quote {
    /// Lowest acceptable output after `slippage_bps` of adverse movement.
    pub fn min_amount_out(&self, slippage_bps: u32) -> HarvesterResult<U256> {
        let slippage = slippage_bps as u64;
        if slippage > BPS_DENOMINATOR {
            return Err(HarvesterError::Config(format!(
                "Slippage of {} bps exceeds {}",
                slippage_bps, BPS_DENOMINATOR
            )));
        }

        // Widen before scaling; the quotient never exceeds `amount_out`
        let kept = U256::from(BPS_DENOMINATOR - slippage);
        let scaled = self.amount_out.full_mul(kept) / U512::from(BPS_DENOMINATOR);
        U256::try_from(scaled)
            .map_err(|_| HarvesterError::Internal(format!("Minimum output of {} overflowed", self.amount_out)))
    }
}

/// Rate through an intermediate asset, when both legs quoted
pub fn cross_rate(first: Option<&Quote>, second: Option<&Quote>) -> Option<f64> {
    Some(first?.rate * second?.rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(amount_out: u64, rate: f64) -> Quote {
        Quote {
            fee_tier: 3000,
            amount_in: U256::exp10(18),
            amount_out: U256::from(amount_out),
            rate,
        }
    }

    #[test]
    fn min_amount_out_floors() {
        let q = quote(1_500_000, 1.5);
        assert_eq!(q.min_amount_out(50).unwrap(), U256::from(1_492_500u64));
        // 999 * 9950 / 10000 = 994.005
        assert_eq!(quote(999, 0.0).min_amount_out(50).unwrap(), U256::from(994u64));
        assert_eq!(q.min_amount_out(0).unwrap(), U256::from(1_500_000u64));
        assert_eq!(q.min_amount_out(10_000).unwrap(), U256::zero());
    }

    #[test]
    fn min_amount_out_handles_largest_quote() {
        let q = Quote {
            fee_tier: 3000,
            amount_in: U256::one(),
            amount_out: U256::MAX,
            rate: 0.0,
        };
        let expected = U256::MAX / U256::from(10_000u64) * U256::from(9_950u64)
            + U256::MAX % U256::from(10_000u64) * U256::from(9_950u64) / U256::from(10_000u64);

        assert_eq!(q.min_amount_out(50).unwrap(), expected);
        assert_eq!(q.min_amount_out(0).unwrap(), U256::MAX);
        assert_eq!(q.min_amount_out(10_000).unwrap(), U256::zero());
    }

    #[test]
    fn slippage_above_whole_is_rejected() {
        assert!(matches!(
            quote(1, 1.0).min_amount_out(10_001),
            Err(HarvesterError::Config(_))
        ));
    }

    #[test]
    fn cross_rate_needs_both_legs() {
        let flock_weth = quote(1, 0.0002);
        let weth_eurc = quote(1, 2500.0);
        let rate = cross_rate(Some(&flock_weth), Some(&weth_eurc)).unwrap();
        assert!((rate - 0.5).abs() < 1e-12);
        assert_eq!(cross_rate(None, Some(&weth_eurc)), None);
        assert_eq!(cross_rate(Some(&flock_weth), None), None);
    }
}
