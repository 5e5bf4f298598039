//! Configuration management for the harvester
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::contracts::ContractConfig;
use crate::workflow::procedure::{Procedure, QuoteAsset};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR_PATTERN: regex::Regex =
        regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: NetworkConfig,
    pub wallets: Vec<WalletConfig>,
    pub tokens: TokensConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub quotes: QuotesConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub procedure: ProcedureConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub name: String,
    pub mnemonic: String,
    /// Rewards from every other wallet are collected here.
    #[serde(default)]
    pub collector: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokensConfig {
    pub flock: ContractConfig,
    pub gmflock: ContractConfig,
    pub weth: ContractConfig,
    pub usdc: ContractConfig,
    pub eurc: ContractConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub delegate: ContractConfig,
    pub gmflock_exchange: ContractConfig,
    pub quoter: ContractConfig,
    pub router: ContractConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub dry_run: bool,
    pub rate_limit_cooldown_ms: u64,
    /// Unbounded when absent.
    pub max_rate_limit_retries: Option<u32>,
    pub receipt_poll_interval_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            rate_limit_cooldown_ms: 5_000,
            max_rate_limit_retries: None,
            receipt_poll_interval_ms: 1_000,
        }
    }
}

impl ExecutorConfig {
    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Unbounded when absent.
    pub max_wait_ms: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_wait_ms: None,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    /// Pool fee tiers in hundredths of a basis point.
    pub fee_tiers: Vec<u32>,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            fee_tiers: vec![100, 500, 3_000, 10_000],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub slippage_bps: u32,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self { slippage_bps: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub lock_period_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            lock_period_secs: 60 * 60 * 24 * 365,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureMode {
    /// Ask on stdin.
    Prompt,
    /// Sell when the FLOCK rate reaches `threshold`, delegate otherwise.
    Threshold,
    Delegate,
    Sell,
    Stop,
}

impl ProcedureMode {
    pub fn explicit(&self) -> Option<Procedure> {
        match self {
            ProcedureMode::Delegate => Some(Procedure::Delegate),
            ProcedureMode::Sell => Some(Procedure::Sell),
            ProcedureMode::Stop => Some(Procedure::Stop),
            ProcedureMode::Prompt | ProcedureMode::Threshold => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcedureConfig {
    pub mode: ProcedureMode,
    pub threshold: Option<f64>,
    pub quote_asset: QuoteAsset,
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        Self {
            mode: ProcedureMode::Prompt,
            threshold: None,
            quote_asset: QuoteAsset::Eurc,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Log the Prometheus text exposition when the run ends.
    pub report: bool,
}

impl Settings {
    /// Load settings from the file named by `HARVESTER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("HARVESTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_path(&config_path)
    }

    /// Load settings from a specific file
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config_str = substitute_env_vars(raw);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.wallets.is_empty() {
            anyhow::bail!("At least one wallet must be configured");
        }

        let collectors = self.wallets.iter().filter(|w| w.collector).count();
        if collectors != 1 {
            anyhow::bail!(
                "Exactly one wallet must be marked as collector, found {}",
                collectors
            );
        }

        for wallet in &self.wallets {
            if wallet.mnemonic.trim().is_empty() {
                anyhow::bail!("Wallet {} has an empty mnemonic", wallet.name);
            }
        }

        if self.network.rpc_url.is_empty() {
            anyhow::bail!("Network {} has no RPC URL configured", self.network.name);
        }

        if self.quotes.fee_tiers.is_empty() {
            anyhow::bail!("At least one quote fee tier must be configured");
        }

        if self.swap.slippage_bps > 10_000 {
            anyhow::bail!(
                "Slippage of {} bps exceeds 10000 bps",
                self.swap.slippage_bps
            );
        }

        if self.polling.interval_ms == 0 || self.executor.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Polling intervals must be positive");
        }

        if self.procedure.mode == ProcedureMode::Threshold && self.procedure.threshold.is_none() {
            anyhow::bail!("Procedure mode 'threshold' requires procedure.threshold");
        }

        if self.executor.max_rate_limit_retries == Some(0) {
            tracing::warn!("max_rate_limit_retries = 0 disables every request; treating as 1");
        }

        Ok(())
    }

    /// Position of the wallet that receives transferred rewards
    pub fn collector_index(&self) -> Option<usize> {
        self.wallets.iter().position(|w| w.collector)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
