//! Safety gate: default-to-deny checks in front of every submission.
//!
//! All checks return `Err(BotError::SafetyBlocked)` on failure so callers
//! never interpret a boolean.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::TradingConfig;
use crate::errors::BotError;

/// Caps applied to opens and to every outgoing transaction.
#[derive(Debug, Clone)]
pub struct SafetyState {
    dry_run: bool,
    max_position_usd: Decimal,
    max_leverage_ratio: Decimal,
    max_gas_price_gwei: u64,
}

impl SafetyState {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            max_position_usd: Decimal::from(config.max_position_usd),
            max_leverage_ratio: config.max_leverage_ratio,
            max_gas_price_gwei: config.max_gas_price_gwei,
        }
    }

    // -----------------------------------------------------------------------
    // Position validation
    // -----------------------------------------------------------------------

    /// Validate a new position's notional and leverage.
    ///
    /// Dry-run does not block here; the submitter stops short of broadcasting
    /// instead, so paper trades still exercise the caps.
    pub fn can_open_position(&self, size_usd: Decimal, leverage: Decimal) -> Result<(), BotError> {
        if size_usd > self.max_position_usd {
            return Err(BotError::SafetyBlocked {
                reason: format!(
                    "position size ${size_usd} exceeds max ${max}",
                    max = self.max_position_usd
                ),
            });
        }

        if leverage > self.max_leverage_ratio {
            return Err(BotError::SafetyBlocked {
                reason: format!(
                    "leverage {leverage}x exceeds max {max}x",
                    max = self.max_leverage_ratio
                ),
            });
        }

        debug!(%size_usd, %leverage, "open passed safety caps");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transaction validation
    // -----------------------------------------------------------------------

    /// Validate whether a transaction can be submitted at the given gas price.
    pub fn can_submit_tx(&self, gas_price_gwei: u64) -> Result<(), BotError> {
        if gas_price_gwei > self.max_gas_price_gwei {
            return Err(BotError::SafetyBlocked {
                reason: format!(
                    "gas price {gas_price_gwei} gwei exceeds max {max} gwei",
                    max = self.max_gas_price_gwei
                ),
            });
        }
        Ok(())
    }

    /// Block an open whose collateral exceeds what the router may pull.
    pub fn check_allowance(&self, amount_in: U256, allowance: U256) -> Result<(), BotError> {
        if amount_in > allowance {
            return Err(BotError::SafetyBlocked {
                reason: format!(
                    "router allowance {allowance} below collateral amount {amount_in}"
                ),
            });
        }
        Ok(())
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
