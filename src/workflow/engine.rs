//! Harvest run: claim, measure, then delegate or sell

use super::procedure::{choose_procedure, prompt_procedure, Procedure, QuoteAsset};
use super::report::RunReport;
use crate::chain::{AllowanceGate, ChainClient};
use crate::config::{ProcedureConfig, ProcedureMode, Settings};
use crate::contracts::calls::{self, SwapParams};
use crate::contracts::{ContractConfig, ContractRegistry, PreparedCall};
use crate::error::{HarvesterError, HarvesterResult};
use crate::quote::{cross_rate, Quote, QuoteSelector};
use crate::tx::{NonceTracker, RetryPolicy, TransactionExecutor, TxOutcome};

use ethers::types::{Address, U256};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run-wide switches that shape the transactions
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub dry_run: bool,
    pub slippage_bps: u32,
    pub lock_period_secs: u64,
}

/// Chain-facing services shared by every workflow
pub struct HarvestServices {
    pub executor: TransactionExecutor,
    pub gate: AllowanceGate,
    pub quotes: QuoteSelector,
}

/// Best quotes of one run and the rates derived from them
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub flock_weth: Option<Quote>,
    pub weth_eurc: Option<Quote>,
    pub weth_usdc: Option<Quote>,
    pub flock_eurc: Option<f64>,
    pub flock_usdc: Option<f64>,
}

impl MarketSnapshot {
    /// FLOCK price in `asset`
    pub fn flock_rate(&self, asset: QuoteAsset) -> Option<f64> {
        match asset {
            QuoteAsset::Weth => self.flock_weth.as_ref().map(|q| q.rate),
            QuoteAsset::Usdc => self.flock_usdc,
            QuoteAsset::Eurc => self.flock_eurc,
        }
    }
}

/// Drives every workflow for a set of wallets
pub struct Harvester {
    /// All configured wallets, collector included
    wallets: Vec<Arc<dyn ChainClient>>,
    /// Receives rewards and runs the follow-up procedure
    collector: Arc<dyn ChainClient>,
    registry: ContractRegistry,
    executor: TransactionExecutor,
    gate: AllowanceGate,
    quotes: QuoteSelector,
    options: HarvestOptions,
    procedure: ProcedureConfig,
}

impl Harvester {
    pub fn new(
        wallets: Vec<Arc<dyn ChainClient>>,
        collector: usize,
        registry: ContractRegistry,
        services: HarvestServices,
        options: HarvestOptions,
        procedure: ProcedureConfig,
    ) -> HarvesterResult<Self> {
        let HarvestServices {
            executor,
            gate,
            quotes,
        } = services;
        let collector = wallets
            .get(collector)
            .cloned()
            .ok_or_else(|| HarvesterError::Config(format!("No wallet at index {}", collector)))?;

        Ok(Self {
            wallets,
            collector,
            registry,
            executor,
            gate,
            quotes,
            options,
            procedure,
        })
    }

    /// Wire the components from configuration. `wallets` must follow the
    /// order of `settings.wallets`.
    pub fn from_settings(
        settings: &Settings,
        wallets: Vec<Arc<dyn ChainClient>>,
        shutdown: CancellationToken,
    ) -> HarvesterResult<Self> {
        let collector = settings
            .collector_index()
            .ok_or_else(|| HarvesterError::Config("No collector wallet configured".to_string()))?;

        let registry = ContractRegistry::from_settings(settings);
        let retry = RetryPolicy::new(
            settings.executor.rate_limit_cooldown(),
            settings.executor.max_rate_limit_retries,
        );
        let executor = TransactionExecutor::new(
            Arc::new(NonceTracker::new()),
            retry.clone(),
            settings.executor.receipt_poll_interval(),
            shutdown.clone(),
        );
        let gate = AllowanceGate::new(
            settings.polling.interval(),
            settings.polling.max_wait(),
            retry.clone(),
            shutdown.clone(),
        );
        let quotes = QuoteSelector::new(
            registry.quoter,
            settings.quotes.fee_tiers.clone(),
            retry,
            shutdown,
        );
        let options = HarvestOptions {
            dry_run: settings.executor.dry_run,
            slippage_bps: settings.swap.slippage_bps,
            lock_period_secs: settings.exchange.lock_period_secs,
        };

        Self::new(
            wallets,
            collector,
            registry,
            HarvestServices {
                executor,
                gate,
                quotes,
            },
            options,
            settings.procedure.clone(),
        )
    }

    /// Full run: collect rewards, look at the market, then follow the
    /// configured (or chosen) procedure.
    pub async fn run(&self, report: &mut RunReport) -> HarvesterResult<()> {
        info!("### Claim FLOCK rewards and collect in {} ###", self.collector.label());
        self.claim_and_transfer(report).await?;

        info!("### Get FLOCK quotes ###");
        let snapshot = self.market_snapshot(report).await?;

        let procedure = match self.procedure.mode {
            ProcedureMode::Prompt => prompt_procedure().await?,
            ref mode => choose_procedure(
                snapshot.flock_rate(self.procedure.quote_asset),
                self.procedure.threshold.unwrap_or(f64::INFINITY),
                mode.explicit(),
            ),
        };
        report.procedure = Some(procedure);
        info!("Proceeding with: {}", procedure);

        match procedure {
            Procedure::Delegate => {
                info!("### Exchange FLOCK for gmFLOCK and delegate it ###");
                self.exchange_and_delegate(report).await
            }
            Procedure::Sell => {
                info!("### Sell FLOCK for ETH ###");
                self.sell(report).await
            }
            Procedure::Stop => {
                report.note("procedure", "Stopping");
                Ok(())
            }
        }
    }

    /// Claim for every wallet at once, then move every non-collector balance
    /// to the collector. Returns the collector's balance afterwards.
    pub async fn claim_and_transfer(&self, report: &mut RunReport) -> HarvesterResult<U256> {
        let claim = calls::claim_rewards(&self.registry.delegate);
        let claims = join_all(
            self.wallets
                .iter()
                .map(|wallet| self.executor.execute(wallet.as_ref(), &claim, self.options.dry_run)),
        )
        .await;

        let flock = self.registry.flock;
        let collector_address = self.collector.address();
        let mut last_block = None;

        for (wallet, claimed) in self.wallets.iter().zip(claims) {
            let outcome = claimed?;
            report.record(&format!("claim ({})", wallet.label()), &outcome);

            let balance = self.balance_after(wallet.as_ref(), &flock, &outcome).await?;
            report.note(
                &format!("FLOCK balance ({})", wallet.label()),
                flock.format(balance),
            );

            if wallet.address() == collector_address {
                continue;
            }
            if balance.is_zero() {
                warn!("No FLOCK to transfer from {}", wallet.label());
                continue;
            }

            let outcome = self
                .executor
                .execute(
                    wallet.as_ref(),
                    &calls::transfer(&flock, collector_address, balance),
                    self.options.dry_run,
                )
                .await?;
            report.record(&format!("transfer ({})", wallet.label()), &outcome);
            last_block = last_block.max(self.read_block(&outcome));
        }

        let combined = self
            .gate
            .balance_of(self.collector.as_ref(), &flock, collector_address, last_block)
            .await?;
        report.note(
            &format!("FLOCK balance ({})", self.collector.label()),
            flock.format(combined),
        );

        Ok(combined)
    }

    /// Best quotes FLOCK -> WETH -> EURC / USDC and the derived FLOCK rates
    pub async fn market_snapshot(&self, report: &mut RunReport) -> HarvesterResult<MarketSnapshot> {
        let client = self.collector.as_ref();
        let r = &self.registry;

        let flock_weth = self.quotes.best_quote(client, &r.flock, &r.weth, None).await?;
        let weth_eurc = self.quotes.best_quote(client, &r.weth, &r.eurc, None).await?;
        let weth_usdc = self.quotes.best_quote(client, &r.weth, &r.usdc, None).await?;

        let snapshot = MarketSnapshot {
            flock_eurc: cross_rate(flock_weth.as_ref(), weth_eurc.as_ref()),
            flock_usdc: cross_rate(flock_weth.as_ref(), weth_usdc.as_ref()),
            flock_weth,
            weth_eurc,
            weth_usdc,
        };

        report.note("FLOCK => WETH quote", rate_message(snapshot.flock_weth.as_ref().map(|q| q.rate)));
        report.note("WETH => EURC quote", rate_message(snapshot.weth_eurc.as_ref().map(|q| q.rate)));
        report.note("FLOCK => EURC quote", rate_message(snapshot.flock_eurc));
        report.note("WETH => USDC quote", rate_message(snapshot.weth_usdc.as_ref().map(|q| q.rate)));
        report.note("FLOCK => USDC quote", rate_message(snapshot.flock_usdc));

        Ok(snapshot)
    }

    /// Exchange the collector's FLOCK for locked gmFLOCK and delegate all of it
    pub async fn exchange_and_delegate(&self, report: &mut RunReport) -> HarvesterResult<()> {
        let client = self.collector.as_ref();
        let owner = client.address();
        let r = &self.registry;

        let flock_balance = self.gate.balance_of(client, &r.flock, owner, None).await?;
        if flock_balance.is_zero() {
            warn!("No FLOCK to exchange");
            report.note("exchange", "Skipped: no FLOCK balance");
            return Ok(());
        }

        self.approve_and_wait(report, "approve exchange", &r.flock, r.gmflock_exchange.address, flock_balance)
            .await?;

        let exchange = calls::exchange_flock(
            &r.gmflock_exchange,
            flock_balance,
            self.options.lock_period_secs,
            owner,
        );
        let outcome = self.executor.execute(client, &exchange, self.options.dry_run).await?;
        report.record("exchange", &outcome);

        let gmflock_balance = self.balance_after(client, &r.gmflock, &outcome).await?;
        report.note("gmFLOCK balance", r.gmflock.format(gmflock_balance));
        if gmflock_balance.is_zero() {
            warn!("No gmFLOCK to delegate");
            return Ok(());
        }

        self.approve_and_wait(report, "approve delegate", &r.gmflock, r.delegate.address, gmflock_balance)
            .await?;

        let outcome = self
            .executor
            .execute(client, &calls::delegate(&r.delegate, gmflock_balance), self.options.dry_run)
            .await?;
        report.record("delegate", &outcome);

        Ok(())
    }

    /// Swap the collector's FLOCK for WETH at the best fee tier and unwrap it
    pub async fn sell(&self, report: &mut RunReport) -> HarvesterResult<()> {
        let client = self.collector.as_ref();
        let owner = client.address();
        let r = &self.registry;

        let flock_balance = self.gate.balance_of(client, &r.flock, owner, None).await?;
        if flock_balance.is_zero() {
            warn!("No FLOCK to sell");
            report.note("swap", "Skipped: no FLOCK balance");
            return Ok(());
        }

        let quote = match self
            .quotes
            .best_quote(client, &r.flock, &r.weth, Some(flock_balance))
            .await?
        {
            Some(quote) => quote,
            None => {
                warn!("No FLOCK => WETH quote available");
                report.note("swap", "Skipped: no FLOCK => WETH quote");
                return Ok(());
            }
        };
        let amount_out_minimum = quote.min_amount_out(self.options.slippage_bps)?;
        info!(
            "Selling {} FLOCK at fee tier {} for at least {} WETH",
            r.flock.format(flock_balance),
            quote.fee_tier,
            r.weth.format(amount_out_minimum)
        );

        self.approve_and_wait(report, "approve swap", &r.flock, r.router.address, flock_balance)
            .await?;

        let swap = calls::exact_input_single(
            &r.router,
            &SwapParams {
                token_in: r.flock.address,
                token_out: r.weth.address,
                fee_tier: quote.fee_tier,
                recipient: owner,
                amount_in: flock_balance,
                amount_out_minimum,
            },
        );
        let outcome = self.executor.execute(client, &swap, self.options.dry_run).await?;
        report.record("swap", &outcome);

        let weth_balance = self.balance_after(client, &r.weth, &outcome).await?;
        report.note("WETH balance", r.weth.format(weth_balance));
        if weth_balance.is_zero() {
            warn!("No WETH to unwrap");
            return Ok(());
        }

        let outcome = self
            .executor
            .execute(client, &calls::withdraw(&r.weth, weth_balance), self.options.dry_run)
            .await?;
        report.record("unwrap", &outcome);

        Ok(())
    }

    /// Approve `spender` from the collector and, on a live run, wait until the
    /// allowance is visible before the dependent call is built.
    async fn approve_and_wait(
        &self,
        report: &mut RunReport,
        step: &str,
        token: &ContractConfig,
        spender: Address,
        amount: U256,
    ) -> HarvesterResult<()> {
        let client = self.collector.as_ref();
        let approve: PreparedCall = calls::approve(token, spender, amount);
        let outcome = self.executor.execute(client, &approve, self.options.dry_run).await?;
        report.record(step, &outcome);

        if !self.options.dry_run {
            self.gate
                .await_allowance(client, token, client.address(), spender, amount)
                .await?;
        }

        Ok(())
    }

    /// Balance as of the block `outcome` was mined in; the head on a dry run
    async fn balance_after(
        &self,
        client: &dyn ChainClient,
        token: &ContractConfig,
        outcome: &TxOutcome,
    ) -> HarvesterResult<U256> {
        self.gate
            .balance_of(client, token, client.address(), self.read_block(outcome))
            .await
    }

    fn read_block(&self, outcome: &TxOutcome) -> Option<u64> {
        if self.options.dry_run {
            None
        } else {
            outcome.block_number()
        }
    }
}

fn rate_message(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => rate.to_string(),
        None => "unavailable".to_string(),
    }
}
