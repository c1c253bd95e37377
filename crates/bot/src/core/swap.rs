//! Post-close conversion of native ETH back into the trading stable.
//!
//! A long close with `withdrawETH` pays out in ETH. Everything above a small
//! gas reserve is swapped through the GMX router so the next open finds its
//! collateral in the stable.

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SwapAfterCloseConfig;
use crate::constants::NATIVE_DECIMALS;
use crate::core::trade_submitter::TradeSubmitter;
use crate::errors::BotError;
use crate::execution::contracts::IRouter;
use crate::execution::{ChainClient, RetryPolicy};
use crate::types::fixed_point::{apply_bps, decimal_to_raw, to_decimal};
use crate::types::{StableSymbol, TokenBook, TokenMeta, TxOutcome};

pub struct PostCloseSwap {
    chain: Arc<dyn ChainClient>,
    submitter: Arc<TradeSubmitter>,
    router: Address,
    weth: Address,
    target_symbol: StableSymbol,
    target: TokenMeta,
    reserve_wei: U256,
    slippage_bps: u32,
    enabled: bool,
    retry: RetryPolicy,
}

impl PostCloseSwap {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        submitter: Arc<TradeSubmitter>,
        router: Address,
        tokens: &TokenBook,
        config: &SwapAfterCloseConfig,
        slippage_bps: u32,
        retry: RetryPolicy,
    ) -> Result<Self, BotError> {
        let reserve_wei = decimal_to_raw(config.native_reserve_eth, NATIVE_DECIMALS).ok_or_else(
            || {
                BotError::Config(format!(
                    "native_reserve_eth {} is not a valid ETH amount",
                    config.native_reserve_eth
                ))
            },
        )?;
        Ok(Self {
            chain,
            submitter,
            router,
            weth: tokens.weth.address,
            target_symbol: config.target,
            target: tokens.stable(config.target)?,
            reserve_wei,
            slippage_bps,
            enabled: config.enabled,
            retry,
        })
    }

    /// Swap native balance above the reserve. `None` when skipped.
    pub async fn run(
        &self,
        account: Address,
        shutdown: &CancellationToken,
    ) -> Result<Option<TxOutcome>, BotError> {
        if !self.enabled {
            return Ok(None);
        }
        if self.submitter.is_dry_run() {
            info!(stable = %self.target_symbol, "dry run: post-close swap skipped");
            return Ok(None);
        }

        let native = self
            .retry
            .run("getBalance", || self.chain.native_balance(account))
            .await?;
        let Some(amount_in) = swappable_amount(native, self.reserve_wei) else {
            warn!(
                native_eth = %to_decimal(native, NATIVE_DECIMALS, 6),
                "native balance within reserve, nothing to swap"
            );
            return Ok(None);
        };

        let quoted = self
            .retry
            .run("getAmountOut", || {
                self.chain.amount_out(self.weth, self.target.address, amount_in)
            })
            .await?;
        let min_out = apply_bps(quoted, self.slippage_bps, false);

        let tx = self.build_transaction(account, amount_in, min_out);
        let outcome = self.submitter.broadcast(tx, "SwapEthToStable", shutdown).await?;

        info!(
            amount_eth = %to_decimal(amount_in, NATIVE_DECIMALS, 6),
            min_out = %to_decimal(min_out, self.target.decimals, 2),
            stable = %self.target_symbol,
            tx_hash = %outcome.tx_hash,
            "post-close swap confirmed"
        );
        Ok(Some(outcome))
    }

    fn build_transaction(&self, account: Address, amount_in: U256, min_out: U256) -> TransactionRequest {
        let call = IRouter::swapETHToTokensCall {
            _path: vec![self.weth, self.target.address],
            _minOut: min_out,
            _receiver: account,
        };
        let mut tx = TransactionRequest::default();
        tx.set_from(account);
        tx.set_to(self.router);
        tx.set_value(amount_in);
        tx.set_input(Bytes::from(call.abi_encode()));
        tx
    }
}

/// Native balance above `reserve`, or `None` when nothing is left.
pub fn swappable_amount(native: U256, reserve: U256) -> Option<U256> {
    native.checked_sub(reserve).filter(|amount| !amount.is_zero())
}
