use alloy::primitives::Address;
use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use super::types::BotConfig;
use crate::constants::{
    ARBITRUM_CHAIN_ID, DAI, GMX_POSITION_ROUTER, GMX_READER, GMX_ROUTER, GMX_VAULT, USDC, USDT,
    WETH,
};

/// GMX caps leverage at 50x.
const PROTOCOL_MAX_LEVERAGE: Decimal = dec!(50);

/// Validate invariants across the merged config that serde alone cannot enforce.
/// Called automatically by [`super::load_config`].
pub fn validate_config(config: &BotConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_chain_config(config, &mut errors);
    validate_trading_config(config, &mut errors);
    validate_timing_config(config, &mut errors);
    validate_signal_config(config, &mut errors);
    validate_schedule_config(config, &mut errors);
    validate_alert_config(config, &mut errors);
    validate_live_mode_requirements(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Chain config
// ---------------------------------------------------------------------------

fn validate_chain_config(config: &BotConfig, errors: &mut Vec<String>) {
    let chain = &config.chain;

    if chain.chain_id != ARBITRUM_CHAIN_ID {
        errors.push(format!(
            "chain: only Arbitrum One (chain_id={ARBITRUM_CHAIN_ID}) is supported, got {}",
            chain.chain_id
        ));
    }

    if chain.rpc.http_url.is_empty() {
        errors.push("chain.rpc: http_url is empty".into());
    }

    let contracts = [
        ("position_router", &chain.contracts.position_router, GMX_POSITION_ROUTER),
        ("router", &chain.contracts.router, GMX_ROUTER),
        ("reader", &chain.contracts.reader, GMX_READER),
        ("vault", &chain.contracts.vault, GMX_VAULT),
    ];
    for (name, addr, known) in contracts {
        match validate_address(addr) {
            Ok(()) => warn_if_unexpected(&format!("chain.contracts.{name}"), addr, known),
            Err(e) => errors.push(format!("chain.contracts.{name}: {e}")),
        }
    }

    let tokens = [("WETH", WETH), ("USDC", USDC), ("USDT", USDT), ("DAI", DAI)];
    for (symbol, known) in tokens {
        match chain.tokens.get(symbol) {
            None => errors.push(format!("chain.tokens: {symbol} is required")),
            Some(token) => {
                match validate_address(&token.address) {
                    Ok(()) => warn_if_unexpected(
                        &format!("chain.tokens.{symbol}"),
                        &token.address,
                        known,
                    ),
                    Err(e) => errors.push(format!("chain.tokens.{symbol}.address: {e}")),
                }
                if token.decimals > 36 {
                    errors.push(format!(
                        "chain.tokens.{symbol}: decimals ({}) exceeds 36",
                        token.decimals
                    ));
                }
            }
        }
    }

    let feed = &chain.price_feed;
    if feed.tokens_url.is_empty() || feed.prices_url.is_empty() {
        errors.push("chain.price_feed: tokens_url and prices_url are required".into());
    }
    if feed.index_symbol.is_empty() {
        errors.push("chain.price_feed: index_symbol is empty".into());
    }
    if feed.timeout_seconds == 0 {
        errors.push("chain.price_feed: timeout_seconds must be > 0".into());
    }
}

/// Configured addresses may legitimately differ (forks, redeployments), so a
/// mismatch with the known Arbitrum deployment is only logged.
fn warn_if_unexpected(field: &str, configured: &str, known: Address) {
    if let Ok(addr) = configured.parse::<Address>() {
        if addr != known {
            warn!(field, %configured, %known, "address differs from GMX Arbitrum deployment");
        }
    }
}

// ---------------------------------------------------------------------------
// Trading config
// ---------------------------------------------------------------------------

fn validate_trading_config(config: &BotConfig, errors: &mut Vec<String>) {
    let t = &config.trading;

    if t.max_leverage_ratio <= dec!(1) || t.max_leverage_ratio > PROTOCOL_MAX_LEVERAGE {
        errors.push(format!(
            "trading: max_leverage_ratio ({}) must be in (1, {PROTOCOL_MAX_LEVERAGE}]",
            t.max_leverage_ratio
        ));
    }

    if t.leverage < dec!(1.1) || t.leverage > t.max_leverage_ratio {
        errors.push(format!(
            "trading: leverage ({}) must be in [1.1, max_leverage_ratio={}]",
            t.leverage, t.max_leverage_ratio
        ));
    }

    if t.slippage_bps == 0 || t.slippage_bps > 500 {
        errors.push(format!(
            "trading: slippage_bps ({}) must be in (0, 500]",
            t.slippage_bps
        ));
    }

    if t.max_gas_price_gwei == 0 {
        errors.push("trading: max_gas_price_gwei must be > 0".into());
    }

    if t.max_position_usd == 0 {
        errors.push("trading: max_position_usd must be > 0".into());
    }

    if t.swap_after_close.native_reserve_eth < Decimal::ZERO {
        errors.push(format!(
            "trading.swap_after_close: native_reserve_eth ({}) must be >= 0",
            t.swap_after_close.native_reserve_eth
        ));
    }
}

// ---------------------------------------------------------------------------
// Timing config
// ---------------------------------------------------------------------------

fn validate_timing_config(config: &BotConfig, errors: &mut Vec<String>) {
    let timing = &config.timing;
    let tx = &timing.transaction;

    if tx.confirmation_timeout_seconds == 0 || tx.simulation_timeout_seconds == 0 {
        errors.push("timing.transaction: timeouts must be > 0".into());
    }
    if tx.receipt_poll_interval_ms == 0 {
        errors.push("timing.transaction: receipt_poll_interval_ms must be > 0".into());
    }

    // The budget must cover at least one inclusion wait plus the keeper grace.
    let minimum = tx.confirmation_timeout_seconds + timing.keeper.grace_period_seconds;
    if timing.cycle.budget_seconds <= minimum {
        errors.push(format!(
            "timing.cycle: budget_seconds ({}) must exceed confirmation timeout + grace ({minimum})",
            timing.cycle.budget_seconds
        ));
    }

    if timing.retry.base_delay_ms > timing.retry.max_delay_ms {
        errors.push(format!(
            "timing.retry: base_delay_ms ({}) must be <= max_delay_ms ({})",
            timing.retry.base_delay_ms, timing.retry.max_delay_ms
        ));
    }
}

// ---------------------------------------------------------------------------
// Signal / schedule / alerts
// ---------------------------------------------------------------------------

fn validate_signal_config(config: &BotConfig, errors: &mut Vec<String>) {
    let s = &config.signal;
    if s.csv_path.is_empty() {
        errors.push("signal: csv_path is empty".into());
    }
    if s.column.is_empty() {
        errors.push("signal: column is empty".into());
    }
    if !s.refresh_commands.is_empty() && s.refresh_timeout_seconds == 0 {
        errors.push("signal: refresh_timeout_seconds must be > 0".into());
    }
}

fn validate_schedule_config(config: &BotConfig, errors: &mut Vec<String>) {
    let s = &config.schedule;
    if s.interval_seconds == 0 {
        errors.push("schedule: interval_seconds must be > 0".into());
    }
    if s.start_delay_seconds >= s.interval_seconds {
        errors.push(format!(
            "schedule: start_delay_seconds ({}) must be < interval_seconds ({})",
            s.start_delay_seconds, s.interval_seconds
        ));
    }
}

fn validate_alert_config(config: &BotConfig, errors: &mut Vec<String>) {
    if let Some(alerts) = config.alerts.as_ref().filter(|a| a.enabled) {
        if !alerts.webhook_url.starts_with("http") {
            errors.push(format!(
                "alerts: webhook_url '{}' must be an http(s) URL",
                alerts.webhook_url
            ));
        }
        if alerts.timeout_seconds == 0 {
            errors.push("alerts: timeout_seconds must be > 0".into());
        }
    }
}

// ---------------------------------------------------------------------------
// Live mode requirements
// ---------------------------------------------------------------------------

fn validate_live_mode_requirements(config: &BotConfig, errors: &mut Vec<String>) {
    if config.trading.dry_run {
        return;
    }

    if std::env::var("TRADING_PRIVATE_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .is_none()
    {
        errors.push("live mode: TRADING_PRIVATE_KEY env var is required when dry_run=false".into());
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate an Ethereum-style address string: must be 0x-prefixed and 42 chars
/// of hex.
fn validate_address(addr: &str) -> Result<(), String> {
    if addr.is_empty() {
        return Err("address is empty".into());
    }
    if !addr.starts_with("0x") && !addr.starts_with("0X") {
        return Err(format!("address '{addr}' must start with 0x"));
    }
    if addr.len() != 42 {
        return Err(format!(
            "address '{addr}' has length {} (expected 42)",
            addr.len()
        ));
    }
    if !addr[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{addr}' contains non-hex characters"));
    }
    Ok(())
}
