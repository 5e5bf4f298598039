//! Contract configuration, ABI bindings and call builders
//!
//! Every contract the harvester touches is described by a `ContractConfig`
//! loaded from the configuration file. The callable surface of each one is
//! generated with `abigen!` in [`bindings`].

pub mod bindings;
pub mod calls;

pub use calls::PreparedCall;

use crate::config::Settings;

use ethers::types::{Address, U256};
use ethers::utils::format_units;
use serde::Deserialize;

/// Address and decimal precision of a deployed contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContractConfig {
    pub address: Address,
    pub decimals: u8,
}

impl ContractConfig {
    /// One whole token in base units
    pub fn one(&self) -> U256 {
        U256::exp10(self.decimals as usize)
    }

    /// Human-readable amount for logs
    pub fn format(&self, amount: U256) -> String {
        format_units(amount, self.decimals as u32).unwrap_or_else(|_| amount.to_string())
    }

    /// Amount as a float scaled by the token's decimals
    pub fn to_decimal(&self, amount: U256) -> f64 {
        self.format(amount).parse().unwrap_or(f64::NAN)
    }
}

/// Tokens and protocol contracts used by the workflows
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    pub flock: ContractConfig,
    pub gmflock: ContractConfig,
    pub weth: ContractConfig,
    pub usdc: ContractConfig,
    pub eurc: ContractConfig,
    pub delegate: ContractConfig,
    pub gmflock_exchange: ContractConfig,
    pub quoter: ContractConfig,
    pub router: ContractConfig,
}

impl ContractRegistry {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            flock: settings.tokens.flock,
            gmflock: settings.tokens.gmflock,
            weth: settings.tokens.weth,
            usdc: settings.tokens.usdc,
            eurc: settings.tokens.eurc,
            delegate: settings.contracts.delegate,
            gmflock_exchange: settings.contracts.gmflock_exchange,
            quoter: settings.contracts.quoter,
            router: settings.contracts.router,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> ContractConfig {
        ContractConfig {
            address: Address::repeat_byte(0x11),
            decimals: 6,
        }
    }

    #[test]
    fn one_unit_respects_decimals() {
        assert_eq!(usdc().one(), U256::from(1_000_000u64));
        let weth = ContractConfig {
            address: Address::repeat_byte(0x22),
            decimals: 18,
        };
        assert_eq!(weth.one(), U256::exp10(18));
    }

    #[test]
    fn decimal_conversions() {
        let token = usdc();
        assert_eq!(token.format(U256::from(1_500_000u64)), "1.500000");
        assert_eq!(token.to_decimal(U256::from(1_500_000u64)), 1.5);
    }

    #[test]
    fn deserializes_from_toml() {
        let config: ContractConfig = toml::from_str(
            r#"address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
decimals = 6"#,
        )
        .unwrap();
        assert_eq!(config.decimals, 6);
        assert_eq!(
            config.address,
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".parse::<Address>().unwrap()
        );
    }
}
