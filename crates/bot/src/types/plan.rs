use alloy::primitives::{Address, B256, U256};
use rust_decimal::Decimal;

use super::position::{PositionPair, StableSymbol};
use super::signal::ReconciledAction;

/// Fully resolved parameters for one position-router request.
///
/// Built by the planner, consumed by the submitter, discarded at cycle end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub action: ReconciledAction,
    /// Swap path. Opens: `[stable, WETH]` (long) or `[stable]` (short).
    /// Closes: `[WETH]` (long) or `[stable]` (short).
    pub path: Vec<Address>,
    pub index_token: Address,
    /// Stable involved on the collateral side; `None` for a long close.
    pub collateral_symbol: Option<StableSymbol>,
    pub is_long: bool,
    /// Collateral transferred in (opens only), raw token units.
    pub amount_in: U256,
    /// Collateral withdrawn (closes only), 30-decimal USD.
    pub collateral_delta: U256,
    /// Notional change, 30-decimal USD.
    pub size_delta: U256,
    /// Worst index price the keeper may execute at, 30 decimals.
    pub acceptable_price: U256,
    /// Wei forwarded as `msg.value`.
    pub execution_fee: U256,
    pub leverage: Decimal,
    pub receiver: Address,
    pub withdraw_eth: bool,
}

/// Confirmed inclusion of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// What the submitter did with a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Dry run: simulated and logged, nothing broadcast.
    Simulated,
    Confirmed(TxOutcome),
}

/// Post-trade state that satisfied the expected transition.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub action: ReconciledAction,
    pub after: PositionPair,
    /// Size of the actioned side after execution.
    pub observed_size: U256,
}
