//! Execution planner: turns a reconciled action plus immutable snapshots into
//! the exact position-router arguments.
//!
//! All amounts stay in `U256` and every division truncates, so a plan never
//! asks for more size or a looser price than the inputs justify.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::debug;

use crate::constants::BPS_DENOMINATOR;
use crate::errors::BotError;
use crate::types::fixed_point::{apply_bps, leverage_to_bps, pow10, usd_to_decimal};
use crate::types::{
    BalanceSnapshot, ExecutionPlan, PositionPair, PriceSnapshot, ReconciledAction, StableSymbol,
    TokenBook,
};

/// Snapshots and parameters one plan is computed from.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub positions: &'a PositionPair,
    pub prices: &'a PriceSnapshot,
    pub balances: &'a BalanceSnapshot,
    pub leverage: Decimal,
    pub execution_fee: U256,
    /// Stable that funds an open.
    pub open_collateral: StableSymbol,
}

pub struct ExecutionPlanner {
    tokens: TokenBook,
    slippage_bps: u32,
    receiver: Address,
}

impl ExecutionPlanner {
    pub fn new(tokens: TokenBook, slippage_bps: u32, receiver: Address) -> Self {
        Self {
            tokens,
            slippage_bps,
            receiver,
        }
    }

    /// Build the plan for `action`; `None` for `NoOp`.
    pub fn plan(
        &self,
        action: ReconciledAction,
        ctx: &PlanContext<'_>,
    ) -> Result<Option<ExecutionPlan>, BotError> {
        let plan = match action {
            ReconciledAction::NoOp => return Ok(None),
            ReconciledAction::CloseLong | ReconciledAction::CloseShort => {
                self.plan_close(action, ctx)?
            }
            ReconciledAction::OpenLong | ReconciledAction::OpenShort => {
                self.plan_open(action, ctx)?
            }
        };

        debug!(
            action = %plan.action,
            size_delta_usd = %usd_to_decimal(plan.size_delta),
            acceptable_price = %usd_to_decimal(plan.acceptable_price),
            amount_in = %plan.amount_in,
            execution_fee = %plan.execution_fee,
            "execution plan built"
        );
        Ok(Some(plan))
    }

    fn plan_close(
        &self,
        action: ReconciledAction,
        ctx: &PlanContext<'_>,
    ) -> Result<ExecutionPlan, BotError> {
        let is_long = action == ReconciledAction::CloseLong;
        let index = ctx.prices.index_price()?;
        let weth = self.tokens.weth.address;

        let (size, path, collateral_symbol, acceptable_price) = if is_long {
            (
                ctx.positions.long.size,
                vec![weth],
                None,
                apply_bps(index.min, self.slippage_bps, false),
            )
        } else {
            let symbol = ctx.positions.short_collateral;
            (
                ctx.positions.short.size,
                vec![self.tokens.stable(symbol)?.address],
                Some(symbol),
                apply_bps(index.max, self.slippage_bps, true),
            )
        };

        if size.is_zero() {
            return Err(BotError::InsufficientBalance {
                reason: format!("{action}: observed position size is zero"),
            });
        }

        // The router only unwraps to ETH when the output token is WETH.
        let withdraw_eth = path.last() == Some(&weth);

        Ok(ExecutionPlan {
            action,
            path,
            index_token: weth,
            collateral_symbol,
            is_long,
            amount_in: U256::ZERO,
            collateral_delta: U256::ZERO,
            size_delta: size,
            acceptable_price,
            execution_fee: ctx.execution_fee,
            leverage: ctx.leverage,
            receiver: self.receiver,
            withdraw_eth,
        })
    }

    fn plan_open(
        &self,
        action: ReconciledAction,
        ctx: &PlanContext<'_>,
    ) -> Result<ExecutionPlan, BotError> {
        let is_long = action == ReconciledAction::OpenLong;
        let symbol = ctx.open_collateral;
        let stable = self.tokens.stable(symbol)?;
        let weth = self.tokens.weth.address;

        let index = ctx.prices.index_price()?;
        let stable_price = ctx.prices.stable_price(symbol)?;

        let amount_in = ctx.balances.stable(symbol);
        if amount_in.is_zero() {
            return Err(BotError::InsufficientBalance {
                reason: format!("{action}: {symbol} balance is zero"),
            });
        }

        let size_delta = open_size_delta(amount_in, stable_price.min, stable.decimals, ctx.leverage)?;
        if size_delta.is_zero() {
            return Err(BotError::InsufficientBalance {
                reason: format!("{action}: {symbol} balance {amount_in} rounds to zero size"),
            });
        }

        let (path, acceptable_price) = if is_long {
            (
                vec![stable.address, weth],
                apply_bps(index.max, self.slippage_bps, true),
            )
        } else {
            (
                vec![stable.address],
                apply_bps(index.min, self.slippage_bps, false),
            )
        };

        Ok(ExecutionPlan {
            action,
            path,
            index_token: weth,
            collateral_symbol: Some(symbol),
            is_long,
            amount_in,
            collateral_delta: U256::ZERO,
            size_delta,
            acceptable_price,
            execution_fee: ctx.execution_fee,
            leverage: ctx.leverage,
            receiver: self.receiver,
            withdraw_eth: false,
        })
    }
}

/// `balance * price / 10^decimals * leverage` at 30 decimals, truncating.
///
/// The stable's min price values the collateral, so the notional never
/// exceeds what the keeper will credit.
pub fn open_size_delta(
    balance: U256,
    stable_price: U256,
    decimals: u8,
    leverage: Decimal,
) -> Result<U256, BotError> {
    let leverage_bps = leverage_to_bps(leverage).ok_or_else(|| {
        BotError::Config(format!("leverage {leverage} cannot be expressed in basis points"))
    })?;

    let collateral_usd = balance
        .checked_mul(stable_price)
        .ok_or_else(|| BotError::MalformedResponse {
            reason: "collateral value overflows U256".into(),
        })?
        / pow10(decimals);

    let notional = collateral_usd
        .checked_mul(leverage_bps)
        .ok_or_else(|| BotError::MalformedResponse {
            reason: "position size overflows U256".into(),
        })?
        / U256::from(BPS_DENOMINATOR);

    Ok(notional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DAI, USDC, USDT, WETH};
    use crate::types::{Position, TokenMeta, TokenPrice};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const ACCOUNT: Address = Address::repeat_byte(0xAA);

    fn usd(n: u64) -> U256 {
        U256::from(n) * pow10(30)
    }

    fn tokens() -> TokenBook {
        let mut stables = HashMap::new();
        stables.insert(StableSymbol::Usdc, TokenMeta { address: USDC, decimals: 6 });
        stables.insert(StableSymbol::Usdt, TokenMeta { address: USDT, decimals: 6 });
        stables.insert(StableSymbol::Dai, TokenMeta { address: DAI, decimals: 18 });
        TokenBook {
            weth: TokenMeta { address: WETH, decimals: 18 },
            stables,
        }
    }

    fn prices(index_min: u64, index_max: u64) -> PriceSnapshot {
        let mut snap = PriceSnapshot {
            index: Some(TokenPrice {
                min: usd(index_min),
                max: usd(index_max),
            }),
            ..Default::default()
        };
        for s in StableSymbol::ALL {
            snap.stables.insert(s, TokenPrice { min: usd(1), max: usd(1) });
        }
        snap
    }

    fn pair(long: U256, short: U256, short_collateral: StableSymbol) -> PositionPair {
        PositionPair {
            long: Position { size: long, ..Default::default() },
            short: Position { size: short, ..Default::default() },
            short_collateral,
        }
    }

    fn planner() -> ExecutionPlanner {
        ExecutionPlanner::new(tokens(), 100, ACCOUNT)
    }

    fn ctx<'a>(
        positions: &'a PositionPair,
        prices: &'a PriceSnapshot,
        balances: &'a BalanceSnapshot,
    ) -> PlanContext<'a> {
        PlanContext {
            positions,
            prices,
            balances,
            leverage: dec!(3),
            execution_fee: U256::from(100_000_000_000_000u64),
            open_collateral: StableSymbol::Usdc,
        }
    }

    #[test]
    fn noop_has_no_plan() {
        let positions = pair(U256::ZERO, U256::ZERO, StableSymbol::Usdc);
        let prices = prices(2000, 2001);
        let balances = BalanceSnapshot::default();
        let plan = planner()
            .plan(ReconciledAction::NoOp, &ctx(&positions, &prices, &balances))
            .unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn close_long_uses_full_size_and_lower_bound() {
        let positions = pair(U256::from(100u64), U256::ZERO, StableSymbol::Usdc);
        let prices = prices(2000, 2002);
        let balances = BalanceSnapshot::default();
        let plan = planner()
            .plan(ReconciledAction::CloseLong, &ctx(&positions, &prices, &balances))
            .unwrap()
            .unwrap();

        assert_eq!(plan.size_delta, U256::from(100u64));
        assert_eq!(plan.acceptable_price, usd(1980));
        assert_eq!(plan.collateral_delta, U256::ZERO);
        assert_eq!(plan.path, vec![WETH]);
        assert!(plan.is_long);
        assert!(plan.withdraw_eth);
        assert_eq!(plan.receiver, ACCOUNT);
        assert_eq!(plan.collateral_symbol, None);
    }

    #[test]
    fn close_short_uses_short_collateral_and_upper_bound() {
        let positions = pair(U256::ZERO, usd(500), StableSymbol::Usdt);
        let prices = prices(1999, 2000);
        let balances = BalanceSnapshot::default();
        let plan = planner()
            .plan(ReconciledAction::CloseShort, &ctx(&positions, &prices, &balances))
            .unwrap()
            .unwrap();

        assert_eq!(plan.size_delta, usd(500));
        assert_eq!(plan.acceptable_price, usd(2020));
        assert_eq!(plan.path, vec![USDT]);
        assert!(!plan.is_long);
        assert!(!plan.withdraw_eth);
        assert_eq!(plan.collateral_symbol, Some(StableSymbol::Usdt));
    }

    #[test]
    fn open_long_sizes_from_stable_balance() {
        let positions = pair(U256::ZERO, U256::ZERO, StableSymbol::Usdc);
        let prices = prices(2000, 2000);
        let mut balances = BalanceSnapshot::default();
        balances.stables.insert(StableSymbol::Usdc, U256::from(1_000_000_000u64)); // 1000 USDC
        let plan = planner()
            .plan(ReconciledAction::OpenLong, &ctx(&positions, &prices, &balances))
            .unwrap()
            .unwrap();

        assert_eq!(plan.size_delta, usd(3000));
        assert_eq!(plan.amount_in, U256::from(1_000_000_000u64));
        assert_eq!(plan.path, vec![USDC, WETH]);
        assert_eq!(plan.acceptable_price, usd(2020));
        assert!(plan.is_long);
        assert!(!plan.withdraw_eth);
    }

    #[test]
    fn open_short_uses_lower_bound_and_single_hop() {
        let positions = pair(U256::ZERO, U256::ZERO, StableSymbol::Usdc);
        let prices = prices(2000, 2010);
        let mut balances = BalanceSnapshot::default();
        balances.stables.insert(StableSymbol::Dai, pow10(18) * U256::from(250u64));
        let mut c = ctx(&positions, &prices, &balances);
        c.open_collateral = StableSymbol::Dai;
        c.leverage = dec!(2);
        let plan = planner().plan(ReconciledAction::OpenShort, &c).unwrap().unwrap();

        assert_eq!(plan.size_delta, usd(500));
        assert_eq!(plan.path, vec![DAI]);
        assert_eq!(plan.acceptable_price, usd(1980));
        assert!(!plan.is_long);
    }

    #[test]
    fn open_with_zero_balance_is_insufficient() {
        let positions = pair(U256::ZERO, U256::ZERO, StableSymbol::Usdc);
        let prices = prices(2000, 2000);
        let balances = BalanceSnapshot::default();
        let err = planner()
            .plan(ReconciledAction::OpenLong, &ctx(&positions, &prices, &balances))
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientBalance");
    }

    #[test]
    fn dust_balance_rounding_to_zero_size_is_rejected() {
        let positions = pair(U256::ZERO, U256::ZERO, StableSymbol::Usdc);
        let mut prices = prices(2000, 2000);
        // A near-zero stable price makes one raw unit worth less than 1e-30 USD.
        prices.stables.insert(
            StableSymbol::Usdc,
            TokenPrice { min: U256::from(1u64), max: U256::from(1u64) },
        );
        let mut balances = BalanceSnapshot::default();
        balances.stables.insert(StableSymbol::Usdc, U256::from(1u64));
        let err = planner()
            .plan(ReconciledAction::OpenLong, &ctx(&positions, &prices, &balances))
            .unwrap_err();
        assert!(matches!(err, BotError::InsufficientBalance { .. }));
    }

    #[test]
    fn missing_index_price_is_unavailable() {
        let positions = pair(U256::from(1u64), U256::ZERO, StableSymbol::Usdc);
        let prices = PriceSnapshot::default();
        let balances = BalanceSnapshot::default();
        let err = planner()
            .plan(ReconciledAction::CloseLong, &ctx(&positions, &prices, &balances))
            .unwrap_err();
        assert!(matches!(err, BotError::PriceUnavailable { .. }));
    }

    #[test]
    fn close_of_zero_size_is_rejected() {
        let positions = pair(U256::ZERO, U256::ZERO, StableSymbol::Usdc);
        let prices = prices(2000, 2000);
        let balances = BalanceSnapshot::default();
        let err = planner()
            .plan(ReconciledAction::CloseShort, &ctx(&positions, &prices, &balances))
            .unwrap_err();
        assert!(matches!(err, BotError::InsufficientBalance { .. }));
    }

    proptest! {
        #[test]
        fn close_size_always_matches_observed(size in 1u64..u64::MAX, long in any::<bool>()) {
            let size = U256::from(size);
            let positions = if long {
                pair(size, U256::ZERO, StableSymbol::Usdc)
            } else {
                pair(U256::ZERO, size, StableSymbol::Usdc)
            };
            let prices = prices(2000, 2001);
            let balances = BalanceSnapshot::default();
            let action = if long { ReconciledAction::CloseLong } else { ReconciledAction::CloseShort };
            let plan = planner().plan(action, &ctx(&positions, &prices, &balances)).unwrap().unwrap();
            prop_assert_eq!(plan.size_delta, size);
        }

        #[test]
        fn open_size_never_exceeds_exact_value(balance in 1u64..u64::MAX, lev_tenths in 11u32..500) {
            let leverage = Decimal::new(lev_tenths as i64, 1);
            let size = open_size_delta(U256::from(balance), usd(1), 6, leverage).unwrap();
            // exact: balance * 1e30 / 1e6 * lev_tenths / 10
            let exact = U256::from(balance) * pow10(24) * U256::from(lev_tenths) / U256::from(10u64);
            prop_assert!(size <= exact);
        }
    }
}
