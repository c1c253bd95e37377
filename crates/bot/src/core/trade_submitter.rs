//! Position-router submission: calldata encoding, simulation, safety gate,
//! broadcast, inclusion wait and the keeper grace interval.
//!
//! A GMX request is two-step. The transaction only queues the request; a
//! keeper executes it a few blocks later. Inclusion is therefore followed by
//! a fixed grace sleep before anyone re-reads positions.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::constants::REFERRAL_CODE;
use crate::core::safety::SafetyState;
use crate::errors::BotError;
use crate::execution::contracts::IPositionRouter;
use crate::execution::TransactionSigner;
use crate::types::fixed_point::usd_to_decimal;
use crate::types::{ExecutionPlan, Submission, TxOutcome};

pub struct TradeSubmitter {
    signer: Arc<dyn TransactionSigner>,
    safety: Arc<SafetyState>,
    position_router: Address,
    grace_period: Duration,
}

impl TradeSubmitter {
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        safety: Arc<SafetyState>,
        position_router: Address,
        grace_period: Duration,
    ) -> Self {
        Self {
            signer,
            safety,
            position_router,
            grace_period,
        }
    }

    /// ABI-encode the router call for `plan`.
    pub fn encode_calldata(plan: &ExecutionPlan) -> Bytes {
        let encoded = if plan.action.is_open() {
            IPositionRouter::createIncreasePositionCall {
                _path: plan.path.clone(),
                _indexToken: plan.index_token,
                _amountIn: plan.amount_in,
                _minOut: U256::ZERO,
                _sizeDelta: plan.size_delta,
                _isLong: plan.is_long,
                _acceptablePrice: plan.acceptable_price,
                _executionFee: plan.execution_fee,
                _referralCode: REFERRAL_CODE,
            }
            .abi_encode()
        } else {
            IPositionRouter::createDecreasePositionCall {
                _path: plan.path.clone(),
                _indexToken: plan.index_token,
                _collateralDelta: plan.collateral_delta,
                _sizeDelta: plan.size_delta,
                _isLong: plan.is_long,
                _receiver: plan.receiver,
                _acceptablePrice: plan.acceptable_price,
                _minOut: U256::ZERO,
                _executionFee: plan.execution_fee,
                _withdrawETH: plan.withdraw_eth,
            }
            .abi_encode()
        };
        Bytes::from(encoded)
    }

    /// Payable router request carrying the execution fee as `msg.value`.
    pub fn build_transaction(&self, plan: &ExecutionPlan) -> TransactionRequest {
        let mut tx = TransactionRequest::default();
        tx.set_from(self.signer.address());
        tx.set_to(self.position_router);
        tx.set_value(plan.execution_fee);
        tx.set_input(Self::encode_calldata(plan));
        tx
    }

    /// Submit `plan` and wait out the keeper grace interval.
    ///
    /// Dry run simulates and logs a paper trade, then returns
    /// [`Submission::Simulated`] without broadcasting.
    pub async fn submit(
        &self,
        plan: &ExecutionPlan,
        shutdown: &CancellationToken,
    ) -> Result<Submission, BotError> {
        let tx = self.build_transaction(plan);

        if self.safety.is_dry_run() {
            self.signer.simulate(&tx).await?;
            self.log_paper_trade(plan);
            return Ok(Submission::Simulated);
        }

        let outcome = self.broadcast(tx, plan.action.as_str(), shutdown).await?;
        self.keeper_grace(shutdown).await?;
        Ok(Submission::Confirmed(outcome))
    }

    /// Simulate, gas-gate, sign, send and wait for inclusion.
    ///
    /// Never retried: a second send could double a position.
    pub async fn broadcast(
        &self,
        tx: TransactionRequest,
        label: &'static str,
        shutdown: &CancellationToken,
    ) -> Result<TxOutcome, BotError> {
        self.signer.simulate(&tx).await?;

        let gas_gwei = self.signer.gas_price_gwei().await?;
        self.safety.can_submit_tx(gas_gwei)?;

        let tx_hash = self.signer.send(tx).await?;
        info!(action = label, tx_hash = %tx_hash, gas_gwei, "request submitted, awaiting inclusion");

        self.signer.wait_for_receipt(tx_hash, shutdown).await
    }

    pub fn is_dry_run(&self) -> bool {
        self.safety.is_dry_run()
    }

    pub fn account(&self) -> Address {
        self.signer.address()
    }

    async fn keeper_grace(&self, shutdown: &CancellationToken) -> Result<(), BotError> {
        info!(
            grace_seconds = self.grace_period.as_secs(),
            "waiting for keeper execution"
        );
        tokio::select! {
            _ = shutdown.cancelled() => Err(BotError::Cancelled { stage: "keeper grace" }),
            _ = tokio::time::sleep(self.grace_period) => Ok(()),
        }
    }

    fn log_paper_trade(&self, plan: &ExecutionPlan) {
        let side = if plan.is_long { "LONG" } else { "SHORT" };
        let path: Vec<String> = plan.path.iter().map(|a| a.to_string()).collect();

        info!("╔══════════════════════════════════════════════════════════════════╗");
        info!("║                 PAPER TRADE: POSITION ROUTER REQUEST             ║");
        info!("╠══════════════════════════════════════════════════════════════════╣");
        info!(
            action = %plan.action,
            side,
            collateral = ?plan.collateral_symbol,
            "║ Action"
        );
        info!(
            size_delta_usd = %usd_to_decimal(plan.size_delta),
            amount_in = %plan.amount_in,
            collateral_delta = %plan.collateral_delta,
            leverage = %plan.leverage,
            "║ Size"
        );
        info!(
            acceptable_price = %usd_to_decimal(plan.acceptable_price),
            execution_fee_wei = %plan.execution_fee,
            withdraw_eth = plan.withdraw_eth,
            "║ Execution Bounds"
        );
        info!(
            router = %self.position_router,
            account = %self.signer.address(),
            path = ?path,
            "║ Addresses"
        );
        info!("╚══════════════════════════════════════════════════════════════════╝");
    }
}
