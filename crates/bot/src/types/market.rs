use alloy::primitives::{Address, U256};
use std::collections::HashMap;

use super::position::StableSymbol;
use crate::errors::BotError;

/// Address and decimals of one ERC-20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMeta {
    pub address: Address,
    pub decimals: u8,
}

/// Resolved token set the bot trades: the index token and the stables.
#[derive(Debug, Clone)]
pub struct TokenBook {
    pub weth: TokenMeta,
    pub stables: HashMap<StableSymbol, TokenMeta>,
}

impl TokenBook {
    pub fn stable(&self, symbol: StableSymbol) -> Result<TokenMeta, BotError> {
        self.stables
            .get(&symbol)
            .copied()
            .ok_or_else(|| BotError::Config(format!("token {symbol} is not configured")))
    }
}

/// Resolved GMX contract addresses.
#[derive(Debug, Clone, Copy)]
pub struct GmxContracts {
    pub position_router: Address,
    pub router: Address,
    pub reader: Address,
    pub vault: Address,
}

/// Min/max price pair at 30 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPrice {
    pub min: U256,
    pub max: U256,
}

impl TokenPrice {
    pub fn is_usable(&self) -> bool {
        !self.min.is_zero() && !self.max.is_zero()
    }
}

/// Prices captured once per cycle from the price index.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    pub index: Option<TokenPrice>,
    pub stables: HashMap<StableSymbol, TokenPrice>,
    /// Current borrow funding rate per stable, as reported by the index.
    pub funding_rates: HashMap<StableSymbol, u64>,
}

impl PriceSnapshot {
    pub fn index_price(&self) -> Result<TokenPrice, BotError> {
        self.index
            .filter(TokenPrice::is_usable)
            .ok_or_else(|| BotError::PriceUnavailable {
                token: "WETH".into(),
            })
    }

    pub fn stable_price(&self, symbol: StableSymbol) -> Result<TokenPrice, BotError> {
        self.stables
            .get(&symbol)
            .copied()
            .filter(TokenPrice::is_usable)
            .ok_or_else(|| BotError::PriceUnavailable {
                token: symbol.to_string(),
            })
    }

    /// Stable with the lowest reported funding rate. Ties go to the earlier
    /// symbol in `StableSymbol::ALL`.
    pub fn cheapest_funding(&self) -> Option<StableSymbol> {
        StableSymbol::ALL
            .iter()
            .filter_map(|s| self.funding_rates.get(s).map(|r| (*s, *r)))
            .min_by_key(|(_, rate)| *rate)
            .map(|(s, _)| s)
    }
}

/// Raw balances captured once per cycle.
#[derive(Debug, Clone, Default)]
pub struct BalanceSnapshot {
    pub stables: HashMap<StableSymbol, U256>,
    pub native: U256,
}

impl BalanceSnapshot {
    pub fn stable(&self, symbol: StableSymbol) -> U256 {
        self.stables.get(&symbol).copied().unwrap_or_default()
    }
}
