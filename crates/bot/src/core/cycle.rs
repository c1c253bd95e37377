//! One reconciliation cycle: read → reconcile → plan → submit → wait → verify.
//!
//! Strictly sequential on one task. Every stage works on the immutable
//! snapshot taken at the start; positions are re-read only after a confirmed
//! submission. The whole cycle runs under one timeout budget, and every abort
//! is reported with the action attempted and the last snapshot seen.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{BotConfig, CollateralConfig, CollateralMode};
use crate::core::alerts::Alerter;
use crate::core::balance_reader::BalanceReader;
use crate::core::planner::{ExecutionPlanner, PlanContext};
use crate::core::position_reader::PositionReader;
use crate::core::reconciler::reconcile_label;
use crate::core::safety::SafetyState;
use crate::core::signal_source::SignalSource;
use crate::core::swap::PostCloseSwap;
use crate::core::trade_submitter::TradeSubmitter;
use crate::core::verifier::PostTradeVerifier;
use crate::errors::BotError;
use crate::execution::{ChainClient, PriceReader, RetryPolicy, TransactionSigner};
use crate::types::fixed_point::usd_to_decimal;
use crate::types::{
    BalanceSnapshot, PositionPair, PriceSnapshot, ReconciledAction, StableSymbol, Submission,
    TokenBook, TxOutcome, VerificationResult,
};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub label: String,
    pub action: ReconciledAction,
    pub before: PositionPair,
    /// `None` for `NoOp`.
    pub submission: Option<Submission>,
    /// `None` for `NoOp` and dry runs.
    pub verification: Option<VerificationResult>,
    pub swap: Option<TxOutcome>,
}

/// Aborted cycle: the reconciled action (if reached), the last known
/// snapshot (if read) and the error.
#[derive(Debug)]
pub struct CycleFailure {
    pub action: Option<ReconciledAction>,
    pub snapshot: Option<PositionPair>,
    pub error: BotError,
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Some(action) => write!(f, "{} during {action}: {}", self.error.kind(), self.error),
            None => write!(f, "{}: {}", self.error.kind(), self.error),
        }
    }
}

impl std::error::Error for CycleFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Read-only view for the `status` command.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub account: Address,
    pub positions: PositionPair,
    pub prices: PriceSnapshot,
    pub balances: BalanceSnapshot,
    /// Allowance to the GMX router per stable.
    pub allowances: HashMap<StableSymbol, U256>,
    pub execution_fee: U256,
    pub tokens: TokenBook,
}

/// What a cycle has learned so far; survives a budget timeout.
#[derive(Debug, Default)]
struct Progress {
    action: Option<ReconciledAction>,
    snapshot: Option<PositionPair>,
}

// ---------------------------------------------------------------------------
// CycleRunner
// ---------------------------------------------------------------------------

pub struct CycleRunner {
    chain: Arc<dyn ChainClient>,
    prices: Arc<dyn PriceReader>,
    positions: Arc<PositionReader>,
    balances: BalanceReader,
    planner: ExecutionPlanner,
    submitter: Arc<TradeSubmitter>,
    verifier: PostTradeVerifier,
    swap: PostCloseSwap,
    safety: Arc<SafetyState>,
    alerter: Alerter,
    tokens: TokenBook,
    account: Address,
    router: Address,
    leverage: Decimal,
    collateral: CollateralConfig,
    budget: Duration,
    retry: RetryPolicy,
}

impl CycleRunner {
    /// Wire every stage from config plus the three injected capabilities.
    ///
    /// `account` is the position owner; it equals the signer's address in
    /// live mode.
    pub fn from_config(
        config: &BotConfig,
        chain: Arc<dyn ChainClient>,
        prices: Arc<dyn PriceReader>,
        signer: Arc<dyn TransactionSigner>,
        account: Address,
    ) -> Result<Self, BotError> {
        let tokens = config.chain.token_book()?;
        let contracts = config.chain.gmx_contracts()?;
        let trading = &config.trading;
        let retry = RetryPolicy::from_config(&config.timing.retry);
        let safety = Arc::new(SafetyState::from_config(trading));

        let positions = Arc::new(PositionReader::new(
            chain.clone(),
            tokens.clone(),
            trading.short_collateral_fallback,
            retry,
        ));
        let submitter = Arc::new(TradeSubmitter::new(
            signer,
            safety.clone(),
            contracts.position_router,
            Duration::from_secs(config.timing.keeper.grace_period_seconds),
        ));
        let swap = PostCloseSwap::new(
            chain.clone(),
            submitter.clone(),
            contracts.router,
            &tokens,
            &trading.swap_after_close,
            trading.slippage_bps,
            retry,
        )?;

        Ok(Self {
            balances: BalanceReader::new(chain.clone(), tokens.clone(), retry),
            planner: ExecutionPlanner::new(tokens.clone(), trading.slippage_bps, account),
            verifier: PostTradeVerifier::new(positions.clone()),
            alerter: Alerter::from_config(config.alerts.as_ref()),
            chain,
            prices,
            positions,
            submitter,
            swap,
            safety,
            tokens,
            account,
            router: contracts.router,
            leverage: trading.leverage,
            collateral: trading.collateral.clone(),
            budget: Duration::from_secs(config.timing.cycle.budget_seconds),
            retry,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// One cycle against the newest label in the signal export.
    pub async fn run_once(
        &self,
        source: &SignalSource,
        shutdown: &CancellationToken,
    ) -> Result<CycleReport, CycleFailure> {
        let label = match source.latest_label().await {
            Ok(label) => label,
            Err(error) => {
                return Err(self
                    .fail(CycleFailure {
                        action: None,
                        snapshot: None,
                        error,
                    })
                    .await)
            }
        };
        self.run_label(&label, shutdown).await
    }

    /// Refresh the signal export, then run one cycle.
    pub async fn run_full(
        &self,
        source: &SignalSource,
        shutdown: &CancellationToken,
    ) -> Result<CycleReport, CycleFailure> {
        if let Err(error) = source.refresh().await {
            return Err(self
                .fail(CycleFailure {
                    action: None,
                    snapshot: None,
                    error,
                })
                .await);
        }
        self.run_once(source, shutdown).await
    }

    /// One cycle for an explicit label, bounded by the cycle budget.
    pub async fn run_label(
        &self,
        label: &str,
        shutdown: &CancellationToken,
    ) -> Result<CycleReport, CycleFailure> {
        let mut progress = Progress::default();
        let outcome =
            tokio::time::timeout(self.budget, self.execute(label, shutdown, &mut progress)).await;

        let error = match outcome {
            Ok(Ok(report)) => {
                info!(
                    signal = %report.label,
                    action = %report.action,
                    submitted = report.submission.is_some(),
                    verified = report.verification.is_some(),
                    swapped = report.swap.is_some(),
                    "cycle complete"
                );
                return Ok(report);
            }
            Ok(Err(e)) => e,
            Err(_) => BotError::CycleTimeout {
                timeout_seconds: self.budget.as_secs(),
            },
        };

        Err(self
            .fail(CycleFailure {
                action: progress.action,
                snapshot: progress.snapshot,
                error,
            })
            .await)
    }

    /// Read-only snapshot of everything a cycle would look at.
    pub async fn status(&self) -> Result<StatusReport, BotError> {
        let positions = self.positions.read(self.account).await?;
        let prices = self.price_snapshot().await?;
        let balances = self.balances.read(self.account).await?;
        let execution_fee = self.execution_fee().await?;

        let mut allowances = HashMap::new();
        for symbol in StableSymbol::ALL {
            let allowance = self
                .balances
                .allowance(symbol, self.account, self.router)
                .await?;
            allowances.insert(symbol, allowance);
        }

        Ok(StatusReport {
            account: self.account,
            positions,
            prices,
            balances,
            allowances,
            execution_fee,
            tokens: self.tokens.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        label: &str,
        shutdown: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<CycleReport, BotError> {
        let before = self.positions.read(self.account).await?;
        progress.snapshot = Some(before.clone());

        let action = reconcile_label(label, &before)?;
        progress.action = Some(action);
        info!(
            signal = %label,
            action = %action,
            long_size_usd = %usd_to_decimal(before.long.size),
            short_size_usd = %usd_to_decimal(before.short.size),
            "signal reconciled"
        );

        let mut report = CycleReport {
            label: label.to_string(),
            action,
            before: before.clone(),
            submission: None,
            verification: None,
            swap: None,
        };

        if action == ReconciledAction::NoOp {
            self.report_holding(&before);
            return Ok(report);
        }

        let execution_fee = self.execution_fee().await?;
        let prices = self.price_snapshot().await?;
        let balances = if action.is_open() {
            self.balances.read(self.account).await?
        } else {
            BalanceSnapshot::default()
        };
        let open_collateral = self.open_collateral(&prices);

        let ctx = PlanContext {
            positions: &before,
            prices: &prices,
            balances: &balances,
            leverage: self.leverage,
            execution_fee,
            open_collateral,
        };
        let Some(plan) = self.planner.plan(action, &ctx)? else {
            return Ok(report);
        };

        if action.is_open() {
            self.safety
                .can_open_position(usd_to_decimal(plan.size_delta), plan.leverage)?;
            let allowance = self
                .balances
                .allowance(open_collateral, self.account, self.router)
                .await?;
            self.safety.check_allowance(plan.amount_in, allowance)?;
        }

        let submission = self.submitter.submit(&plan, shutdown).await?;
        report.submission = Some(submission.clone());

        if let Submission::Confirmed(outcome) = submission {
            info!(action = %action, tx_hash = %outcome.tx_hash, "verifying keeper execution");
            let after = self.verifier.reread(self.account).await?;
            progress.snapshot = Some(after.clone());
            report.verification = Some(self.verifier.verify(action, &before, after)?);

            if action == ReconciledAction::CloseLong {
                report.swap = self.swap.run(self.account, shutdown).await?;
            }
        }

        Ok(report)
    }

    async fn execution_fee(&self) -> Result<U256, BotError> {
        self.retry
            .run("minExecutionFee", || self.chain.min_execution_fee())
            .await
    }

    async fn price_snapshot(&self) -> Result<PriceSnapshot, BotError> {
        self.retry
            .run("priceSnapshot", || self.prices.snapshot(&self.tokens))
            .await
    }

    fn open_collateral(&self, prices: &PriceSnapshot) -> StableSymbol {
        match self.collateral.mode {
            CollateralMode::Fixed => self.collateral.symbol,
            CollateralMode::CheapestFunding => match prices.cheapest_funding() {
                Some(symbol) => {
                    info!(stable = %symbol, "cheapest funding stable selected");
                    symbol
                }
                None => {
                    warn!(
                        fallback = %self.collateral.symbol,
                        "no funding rates available, using configured stable"
                    );
                    self.collateral.symbol
                }
            },
        }
    }

    fn report_holding(&self, positions: &PositionPair) {
        if positions.long.is_open() {
            info!(
                size_usd = %usd_to_decimal(positions.long.size),
                profit_pct = %positions.long.profit_percent(self.leverage),
                "holding long"
            );
        } else if positions.short.is_open() {
            info!(
                size_usd = %usd_to_decimal(positions.short.size),
                collateral = %positions.short_collateral,
                profit_pct = %positions.short.profit_percent(self.leverage),
                "holding short"
            );
        } else {
            info!("flat, nothing to do");
        }
    }

    async fn fail(&self, failure: CycleFailure) -> CycleFailure {
        match failure.error {
            BotError::Cancelled { stage } => {
                warn!(stage, action = ?failure.action, "cycle cancelled by shutdown");
            }
            _ => self.alerter.cycle_failed(&failure).await,
        }
        failure
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DAI, GMX_ROUTER, USDC};
    use crate::core::testing::{
        flat_positions, raw_positions, test_bot_config, test_prices, usd, FakeChain, FakePrices,
        FakeSigner, FlakyPrices, ACCOUNT,
    };
    use crate::execution::contracts::IPositionRouter;
    use crate::types::fixed_point::pow10;
    use alloy::sol_types::SolCall;

    struct Harness {
        runner: CycleRunner,
        chain: Arc<FakeChain>,
        signer: Arc<FakeSigner>,
    }

    fn harness_with(config: &BotConfig, chain: FakeChain, prices: PriceSnapshot) -> Harness {
        let chain = Arc::new(chain);
        let signer = Arc::new(FakeSigner::new());
        let runner = CycleRunner::from_config(
            config,
            chain.clone(),
            Arc::new(FakePrices { snapshot: prices }),
            signer.clone(),
            ACCOUNT,
        )
        .unwrap();
        Harness { runner, chain, signer }
    }

    fn harness(dry_run: bool, chain: FakeChain) -> Harness {
        harness_with(&test_bot_config(dry_run), chain, test_prices(2000, 2000))
    }

    fn long_of(size: U256) -> Vec<U256> {
        raw_positions(size, [U256::ZERO; 3])
    }

    fn sent_decrease(signer: &FakeSigner) -> IPositionRouter::createDecreasePositionCall {
        let sent = signer.sent();
        let input = sent[0].input.input().cloned().unwrap_or_default();
        IPositionRouter::createDecreasePositionCall::abi_decode(&input).unwrap()
    }

    fn sent_increase(signer: &FakeSigner) -> IPositionRouter::createIncreasePositionCall {
        let sent = signer.sent();
        let input = sent[0].input.input().cloned().unwrap_or_default();
        IPositionRouter::createIncreasePositionCall::abi_decode(&input).unwrap()
    }

    // -- Scenario A: WAIT with an open long closes it ------------------------

    #[tokio::test]
    async fn wait_with_open_long_closes_it() {
        let chain = FakeChain::new(vec![long_of(U256::from(100u64)), flat_positions()]);
        let h = harness(false, chain);

        let report = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.action, ReconciledAction::CloseLong);
        assert!(matches!(report.submission, Some(Submission::Confirmed(_))));
        assert_eq!(report.verification.unwrap().observed_size, U256::ZERO);
        assert!(report.swap.is_none(), "no native balance above reserve");

        let call = sent_decrease(&h.signer);
        assert_eq!(call._sizeDelta, U256::from(100u64));
        assert_eq!(call._acceptablePrice, usd(1980));
        assert!(call._isLong);
        assert_eq!(h.chain.position_calls(), 2);
    }

    // -- Scenario B: LONGING while flat opens 3x from the USDC balance -------

    #[tokio::test]
    async fn longing_when_flat_opens_long() {
        let chain = FakeChain::new(vec![flat_positions(), long_of(usd(3000))])
            .with_balance(USDC, U256::from(1_000_000_000u64));
        let h = harness(false, chain);

        let report = h
            .runner
            .run_label("LONGING", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.action, ReconciledAction::OpenLong);
        assert_eq!(report.verification.unwrap().observed_size, usd(3000));

        let call = sent_increase(&h.signer);
        assert_eq!(call._sizeDelta, usd(3000));
        assert_eq!(call._amountIn, U256::from(1_000_000_000u64));
        assert_eq!(call._path.len(), 2);
        assert_eq!(h.signer.sent()[0].value, Some(h.chain.execution_fee));
    }

    // -- Scenario C: malformed reader output aborts before reconciling -------

    #[tokio::test]
    async fn malformed_positions_abort_cycle() {
        let chain = FakeChain::new(vec![vec![U256::ZERO; 26]]);
        let h = harness(false, chain);

        let failure = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), "MalformedResponse");
        assert!(failure.action.is_none());
        assert!(failure.snapshot.is_none());
        assert!(h.signer.sent().is_empty());
    }

    // -- Scenario D: keeper never executes the close -------------------------

    #[tokio::test]
    async fn unexecuted_close_is_not_confirmed() {
        let chain = FakeChain::new(vec![
            long_of(U256::from(100u64)),
            long_of(U256::from(90u64)),
        ]);
        let h = harness(false, chain);

        let failure = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, BotError::ExecutionNotConfirmed { .. }));
        assert_eq!(failure.action, Some(ReconciledAction::CloseLong));
        // Reported snapshot is the post-grace read, not the pre-trade one.
        assert_eq!(failure.snapshot.unwrap().long.size, U256::from(90u64));
        assert_eq!(h.signer.sent().len(), 1);
    }

    // -- Scenario E: unknown label ------------------------------------------

    #[tokio::test]
    async fn unknown_label_is_rejected_with_snapshot() {
        let h = harness(false, FakeChain::new(vec![flat_positions()]));

        let failure = h
            .runner
            .run_label("HOLD", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), "UnrecognizedSignal");
        assert!(failure.action.is_none());
        assert!(failure.snapshot.is_some());
        assert!(failure.to_string().starts_with("UnrecognizedSignal"));
    }

    // -- Other paths ---------------------------------------------------------

    #[tokio::test]
    async fn holding_long_is_noop() {
        let h = harness(false, FakeChain::new(vec![long_of(usd(500))]));
        let report = h
            .runner
            .run_label("LONGING", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.action, ReconciledAction::NoOp);
        assert!(report.submission.is_none());
        assert_eq!(h.signer.simulated(), 0);
    }

    #[tokio::test]
    async fn dry_run_skips_send_and_verification() {
        let chain = FakeChain::new(vec![long_of(U256::from(100u64))]);
        let h = harness(true, chain);

        let report = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.submission, Some(Submission::Simulated));
        assert!(report.verification.is_none());
        assert!(h.signer.sent().is_empty());
        assert_eq!(h.signer.simulated(), 1);
        assert_eq!(h.chain.position_calls(), 1);
    }

    #[tokio::test]
    async fn hedged_account_is_ambiguous() {
        let chain = FakeChain::new(vec![raw_positions(
            U256::from(1u64),
            [U256::from(2u64), U256::ZERO, U256::ZERO],
        )]);
        let h = harness(false, chain);
        let failure = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.error.kind(), "AmbiguousPositionState");
    }

    #[tokio::test]
    async fn transient_read_failures_are_retried() {
        let chain = FakeChain::new(vec![flat_positions()]).failing_reads(2);
        let h = harness(false, chain);
        let report = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.action, ReconciledAction::NoOp);
        assert_eq!(h.chain.position_calls(), 3);
    }

    #[tokio::test]
    async fn transient_price_index_failure_is_retried() {
        let chain = Arc::new(FakeChain::new(vec![long_of(U256::from(100u64)), flat_positions()]));
        let prices = Arc::new(FlakyPrices::new(test_prices(2000, 2000), 1));
        let signer = Arc::new(FakeSigner::new());
        let runner = CycleRunner::from_config(
            &test_bot_config(false),
            chain,
            prices.clone(),
            signer.clone(),
            ACCOUNT,
        )
        .unwrap();

        let report = runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.action, ReconciledAction::CloseLong);
        assert!(matches!(report.submission, Some(Submission::Confirmed(_))));
        assert_eq!(prices.calls(), 2);
        assert_eq!(signer.sent().len(), 1);
    }

    #[tokio::test]
    async fn persistent_read_failure_surfaces_network_error() {
        let chain = FakeChain::new(vec![flat_positions()]).failing_reads(10);
        let h = harness(false, chain);
        let failure = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.error.kind(), "NetworkError");
        assert_eq!(h.chain.position_calls(), 4);
    }

    #[tokio::test]
    async fn short_allowance_blocks_open() {
        let mut chain = FakeChain::new(vec![flat_positions()])
            .with_balance(USDC, U256::from(1_000_000_000u64));
        chain.allowance = U256::from(5u64);
        let h = harness(false, chain);

        let failure = h
            .runner
            .run_label("SHORTING", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.error.kind(), "SafetyBlocked");
        assert_eq!(failure.action, Some(ReconciledAction::OpenShort));
        assert!(h.signer.sent().is_empty());
    }

    #[tokio::test]
    async fn oversized_open_is_blocked() {
        // 20k USDC at 3x = 60k notional, above the 50k cap.
        let chain = FakeChain::new(vec![flat_positions()])
            .with_balance(USDC, U256::from(20_000_000_000u64));
        let h = harness(false, chain);
        let failure = h
            .runner
            .run_label("LONGING", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(failure.error.to_string().contains("position size"));
    }

    #[tokio::test]
    async fn empty_balance_is_insufficient() {
        let h = harness(false, FakeChain::new(vec![flat_positions()]));
        let failure = h
            .runner
            .run_label("LONGING", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.error.kind(), "InsufficientBalance");
    }

    #[tokio::test]
    async fn cheapest_funding_selects_collateral() {
        let mut config = test_bot_config(false);
        config.trading.collateral.mode = CollateralMode::CheapestFunding;
        let mut prices = test_prices(2000, 2000);
        prices.funding_rates.insert(StableSymbol::Dai, 1);

        let chain = FakeChain::new(vec![flat_positions(), raw_positions(U256::ZERO, [U256::ZERO, U256::ZERO, usd(300)])])
            .with_balance(DAI, pow10(18) * U256::from(100u64));
        let h = harness_with(&config, chain, prices);

        let report = h
            .runner
            .run_label("SHORTING", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.action, ReconciledAction::OpenShort);
        let call = sent_increase(&h.signer);
        assert_eq!(call._path, vec![DAI]);
        assert_eq!(call._sizeDelta, usd(300));
    }

    #[tokio::test]
    async fn close_long_swaps_native_proceeds() {
        let mut chain = FakeChain::new(vec![long_of(usd(300)), flat_positions()]);
        chain.native = pow10(17); // 0.1 ETH
        chain.amount_out = U256::from(160_000_000u64);
        let h = harness(false, chain);

        let report = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.swap.is_some());
        let sent = h.signer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, Some(GMX_ROUTER.into()));
    }

    #[tokio::test]
    async fn cancelled_shutdown_reports_stage() {
        let mut config = test_bot_config(false);
        config.timing.keeper.grace_period_seconds = 3600;
        let chain = FakeChain::new(vec![long_of(U256::from(100u64))]);
        let h = harness_with(&config, chain, test_prices(2000, 2000));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let failure = h.runner.run_label("WAIT", &shutdown).await.unwrap_err();
        assert!(matches!(failure.error, BotError::Cancelled { stage: "keeper grace" }));
    }

    #[tokio::test]
    async fn budget_overrun_is_cycle_timeout() {
        let mut config = test_bot_config(false);
        config.timing.keeper.grace_period_seconds = 60;
        config.timing.cycle.budget_seconds = 1;
        let chain = FakeChain::new(vec![long_of(U256::from(100u64))]);
        let h = harness_with(&config, chain, test_prices(2000, 2000));

        let failure = h
            .runner
            .run_label("WAIT", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, BotError::CycleTimeout { timeout_seconds: 1 }));
        assert_eq!(failure.action, Some(ReconciledAction::CloseLong));
        assert!(failure.snapshot.is_some());
    }

    #[tokio::test]
    async fn status_collects_allowances_for_every_stable() {
        let chain = FakeChain::new(vec![flat_positions()]).with_balance(USDC, U256::from(7u64));
        let h = harness(true, chain);
        let status = h.runner.status().await.unwrap();
        assert_eq!(status.allowances.len(), 3);
        assert_eq!(status.balances.stable(StableSymbol::Usdc), U256::from(7u64));
        assert!(status.positions.is_flat());
    }
}
