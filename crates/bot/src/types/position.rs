use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{BPS_DENOMINATOR, POSITION_FIELD_COUNT};

/// Side of a GMX perpetual position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Collateral = WETH, index = WETH.
    Long,
    /// Collateral = a stable, index = WETH.
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long)
    }
}

/// Stablecoins accepted as short collateral and as open-side funding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StableSymbol {
    Usdc,
    Usdt,
    Dai,
}

impl StableSymbol {
    /// Order of the short slots in a position read.
    pub const ALL: [StableSymbol; 3] = [StableSymbol::Usdc, StableSymbol::Usdt, StableSymbol::Dai];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usdc => "USDC",
            Self::Usdt => "USDT",
            Self::Dai => "DAI",
        }
    }
}

impl fmt::Display for StableSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StableSymbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USDC" => Ok(Self::Usdc),
            "USDT" => Ok(Self::Usdt),
            "DAI" => Ok(Self::Dai),
            other => Err(format!("unknown stable symbol '{other}'")),
        }
    }
}

/// One side of the account's exposure as reported by `Reader.getPositions`.
///
/// `size`, `collateral`, `average_price` and `delta` are 30-decimal USD values.
/// `size == 0` means the side is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub size: U256,
    pub collateral: U256,
    pub average_price: U256,
    pub entry_funding_rate: U256,
    pub has_realised_profit: bool,
    pub realised_pnl: U256,
    pub last_increased_time: u64,
    pub has_profit: bool,
    pub delta: U256,
}

impl Position {
    /// Build from one 9-field stride of the reader's flat array.
    ///
    /// Callers guarantee `fields.len() == POSITION_FIELD_COUNT`.
    pub fn from_fields(fields: &[U256]) -> Self {
        debug_assert_eq!(fields.len(), POSITION_FIELD_COUNT);
        Self {
            size: fields[0],
            collateral: fields[1],
            average_price: fields[2],
            entry_funding_rate: fields[3],
            has_realised_profit: !fields[4].is_zero(),
            realised_pnl: fields[5],
            last_increased_time: u64::try_from(fields[6]).unwrap_or(u64::MAX),
            has_profit: !fields[7].is_zero(),
            delta: fields[8],
        }
    }

    pub fn is_open(&self) -> bool {
        !self.size.is_zero()
    }

    /// Unrealised PnL as a signed percentage of margin:
    /// `delta / size * leverage * 100`, negative when the position is under water.
    ///
    /// Resolution is one basis point of notional.
    pub fn profit_percent(&self, leverage: Decimal) -> Decimal {
        if self.size.is_zero() {
            return Decimal::ZERO;
        }
        let bps = self.delta * U256::from(BPS_DENOMINATOR) / self.size;
        let bps = u64::try_from(bps).unwrap_or(u64::MAX);
        let pct = Decimal::from(bps) / Decimal::from(100u64) * leverage;
        if self.has_profit {
            pct
        } else {
            -pct
        }
    }
}

/// Fresh snapshot of both sides for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPair {
    pub long: Position,
    pub short: Position,
    /// Stable backing the short record (first non-empty slot, else the fallback).
    pub short_collateral: StableSymbol,
}

impl PositionPair {
    pub fn side(&self, side: PositionSide) -> &Position {
        match side {
            PositionSide::Long => &self.long,
            PositionSide::Short => &self.short,
        }
    }

    pub fn is_flat(&self) -> bool {
        !self.long.is_open() && !self.short.is_open()
    }

    pub fn is_hedged(&self) -> bool {
        self.long.is_open() && self.short.is_open()
    }
}
