use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::constants::DEFAULT_SLIPPAGE_BPS;
use crate::errors::BotError;
use crate::types::{GmxContracts, StableSymbol, TokenBook, TokenMeta};

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub app: AppConfig,
    pub chain: ChainConfig,
    pub trading: TradingConfig,
    pub timing: TimingConfig,
    pub signal: SignalConfig,
    pub schedule: ScheduleConfig,
    pub alerts: Option<AlertConfig>,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

fn default_log_prefix() -> String {
    "bot.log".into()
}

// ---------------------------------------------------------------------------
// chains/42161.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc: RpcConfig,
    pub contracts: ContractsConfig,
    /// Keyed by symbol: `WETH`, `USDC`, `USDT`, `DAI`.
    pub tokens: HashMap<String, TokenConfig>,
    pub price_feed: PriceFeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub position_router: String,
    pub router: String,
    pub reader: String,
    pub vault: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedConfig {
    /// Token data endpoint: `[{ "data": { symbol, minPrice, maxPrice, fundingRate } }]`.
    pub tokens_url: String,
    /// Flat price endpoint: `{ "<address>": "<price>" }`, used when the token
    /// data lacks the index token.
    pub prices_url: String,
    /// Symbol of the index token in the token data (`ETH` on GMX).
    pub index_symbol: String,
    pub timeout_seconds: u64,
}

impl ChainConfig {
    /// Parse configured addresses into a [`TokenBook`].
    pub fn token_book(&self) -> Result<TokenBook, BotError> {
        let weth = self.token_meta("WETH")?;
        let mut stables = HashMap::new();
        for symbol in StableSymbol::ALL {
            stables.insert(symbol, self.token_meta(symbol.as_str())?);
        }
        Ok(TokenBook { weth, stables })
    }

    pub fn gmx_contracts(&self) -> Result<GmxContracts, BotError> {
        let c = &self.contracts;
        Ok(GmxContracts {
            position_router: parse_address("contracts.position_router", &c.position_router)?,
            router: parse_address("contracts.router", &c.router)?,
            reader: parse_address("contracts.reader", &c.reader)?,
            vault: parse_address("contracts.vault", &c.vault)?,
        })
    }

    fn token_meta(&self, symbol: &str) -> Result<TokenMeta, BotError> {
        let token = self
            .tokens
            .get(symbol)
            .ok_or_else(|| BotError::Config(format!("chain.tokens.{symbol} is missing")))?;
        Ok(TokenMeta {
            address: parse_address(&format!("tokens.{symbol}"), &token.address)?,
            decimals: token.decimals,
        })
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, BotError> {
    value
        .parse()
        .map_err(|e| BotError::Config(format!("{field}: invalid address '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// trading.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    pub dry_run: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub leverage: Decimal,
    /// Acceptable-price tolerance in basis points.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    pub collateral: CollateralConfig,
    /// Stable reported for the short side when no short slot is open.
    pub short_collateral_fallback: StableSymbol,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_leverage_ratio: Decimal,
    pub max_position_usd: u64,
    pub max_gas_price_gwei: u64,
    pub swap_after_close: SwapAfterCloseConfig,
}

fn default_slippage_bps() -> u32 {
    DEFAULT_SLIPPAGE_BPS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralMode {
    /// Always fund opens with `collateral.symbol`.
    Fixed,
    /// Fund opens with the stable that has the lowest funding rate.
    CheapestFunding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollateralConfig {
    pub mode: CollateralMode,
    pub symbol: StableSymbol,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapAfterCloseConfig {
    pub enabled: bool,
    /// Stable to receive native ETH after a long close.
    pub target: StableSymbol,
    /// ETH kept back for gas and execution fees.
    #[serde(with = "rust_decimal::serde::str")]
    pub native_reserve_eth: Decimal,
}

// ---------------------------------------------------------------------------
// timing.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    pub transaction: TransactionTiming,
    pub keeper: KeeperTiming,
    pub cycle: CycleTiming,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionTiming {
    pub confirmation_timeout_seconds: u64,
    pub simulation_timeout_seconds: u64,
    pub receipt_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeeperTiming {
    /// Wait after inclusion for the keeper to execute the request.
    pub grace_period_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleTiming {
    pub budget_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

// ---------------------------------------------------------------------------
// signal.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    pub csv_path: String,
    /// Header of the column carrying the label.
    pub column: String,
    /// Shell commands run before a `full` cycle to refresh the export.
    #[serde(default)]
    pub refresh_commands: Vec<String>,
    pub refresh_timeout_seconds: u64,
}

// ---------------------------------------------------------------------------
// schedule.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub interval_seconds: u64,
    pub start_delay_seconds: u64,
}

// ---------------------------------------------------------------------------
// alerts.json (optional)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub timeout_seconds: u64,
}
