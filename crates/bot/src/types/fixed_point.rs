//! Helpers for on-chain fixed-point integers.
//!
//! GMX prices and USD amounts use 30 decimals, token balances use the token's
//! own decimals. Arithmetic stays in `U256` and truncates at every division;
//! `Decimal` appears only at the edges (config values, log fields).

use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::constants::{BPS_DENOMINATOR, USD_DECIMALS};

/// `10^decimals` as `U256`.
pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Scale `value` by `(10_000 + bps) / 10_000` (rounding up the bound) or
/// `(10_000 - bps) / 10_000` (rounding down the bound). Truncates.
pub fn apply_bps(value: U256, bps: u32, up: bool) -> U256 {
    let denom = U256::from(BPS_DENOMINATOR);
    let bps = U256::from(bps);
    let factor = if up {
        denom + bps
    } else {
        denom.saturating_sub(bps)
    };
    value * factor / denom
}

/// Leverage multiplier as whole basis points (`3` → `30_000`).
///
/// Returns `None` for negative or unrepresentable values.
pub fn leverage_to_bps(leverage: Decimal) -> Option<U256> {
    let bps = (leverage * Decimal::from(BPS_DENOMINATOR)).trunc();
    bps.to_u64().map(U256::from)
}

/// Human-readable view of a raw integer with `decimals` places, truncated to
/// `dp` places. Values too large for `Decimal` saturate.
pub fn to_decimal(raw: U256, decimals: u8, dp: u32) -> Decimal {
    let dp = dp.min(decimals as u32);
    let shift = decimals - dp as u8;
    let scaled = raw / pow10(shift);
    match i128::try_from(scaled) {
        Ok(v) => Decimal::try_from_i128_with_scale(v, dp).unwrap_or(Decimal::MAX),
        Err(_) => Decimal::MAX,
    }
}

/// 30-decimal USD value as a cent-resolution `Decimal`.
pub fn usd_to_decimal(raw: U256) -> Decimal {
    to_decimal(raw, USD_DECIMALS, 2)
}

/// Decimal amount of a token (e.g. `0.02` ETH) to its raw integer, truncated.
pub fn decimal_to_raw(amount: Decimal, decimals: u8) -> Option<U256> {
    if amount.is_sign_negative() {
        return None;
    }
    let scaled = (amount * Decimal::from(10u64.checked_pow(decimals as u32)?)).trunc();
    scaled.to_u128().map(U256::from)
}

/// Parse a base-10 integer string (price index payloads) into `U256`.
pub fn parse_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}
