//! HTTP price index client.
//!
//! GMX publishes per-token min/max prices and borrow funding rates as JSON.
//! [`PriceReader`] is the capability the cycle depends on; [`GmxPriceFeed`]
//! implements it over `reqwest`.

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PriceFeedConfig;
use crate::errors::BotError;
use crate::types::fixed_point::parse_u256;
use crate::types::{PriceSnapshot, StableSymbol, TokenBook, TokenPrice};

/// Source of per-cycle price snapshots.
#[async_trait]
pub trait PriceReader: Send + Sync {
    async fn snapshot(&self, tokens: &TokenBook) -> Result<PriceSnapshot, BotError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenEntry {
    data: TokenData,
}

/// Numeric fields arrive as decimal strings or plain JSON numbers depending
/// on magnitude, so they stay as `Value` until parsed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    symbol: String,
    min_price: Option<Value>,
    max_price: Option<Value>,
    funding_rate: Option<Value>,
}

fn value_to_u256(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => parse_u256(s),
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}

/// Build a snapshot from the token-data payload. Entries with unparseable
/// prices are skipped; the planner reports what it needs but cannot find.
fn snapshot_from_token_data(entries: &[TokenEntry], index_symbol: &str) -> PriceSnapshot {
    let mut snapshot = PriceSnapshot::default();

    for entry in entries {
        let data = &entry.data;
        let price = match (
            data.min_price.as_ref().and_then(value_to_u256),
            data.max_price.as_ref().and_then(value_to_u256),
        ) {
            (Some(min), Some(max)) => Some(TokenPrice { min, max }),
            _ => None,
        };

        if data.symbol.eq_ignore_ascii_case(index_symbol) {
            snapshot.index = price;
            continue;
        }

        if let Ok(symbol) = data.symbol.parse::<StableSymbol>() {
            if let Some(price) = price {
                snapshot.stables.insert(symbol, price);
            }
            let rate = data
                .funding_rate
                .as_ref()
                .and_then(value_to_u256)
                .and_then(|r| u64::try_from(r).ok());
            if let Some(rate) = rate {
                snapshot.funding_rates.insert(symbol, rate);
            }
        }
    }

    snapshot
}

/// Look up one token in the flat `{address: price}` payload. Keys may be
/// checksummed or lowercase.
fn price_for_address(prices: &HashMap<String, Value>, token: Address) -> Option<U256> {
    prices
        .iter()
        .find(|(key, _)| key.parse::<Address>().ok() == Some(token))
        .and_then(|(_, v)| value_to_u256(v))
}

// ---------------------------------------------------------------------------
// GmxPriceFeed
// ---------------------------------------------------------------------------

pub struct GmxPriceFeed {
    http: Client,
    tokens_url: String,
    prices_url: String,
    index_symbol: String,
}

impl GmxPriceFeed {
    pub fn new(config: &PriceFeedConfig) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BotError::Config(format!("price feed HTTP client: {e}")))?;
        Ok(Self {
            http,
            tokens_url: config.tokens_url.clone(),
            prices_url: config.prices_url.clone(),
            index_symbol: config.index_symbol.clone(),
        })
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, BotError> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        serde_json::from_str(&body).map_err(|e| BotError::MalformedResponse {
            reason: format!("{url}: {e}"),
        })
    }
}

#[async_trait]
impl PriceReader for GmxPriceFeed {
    async fn snapshot(&self, tokens: &TokenBook) -> Result<PriceSnapshot, BotError> {
        let entries: Vec<TokenEntry> = self.fetch_json(&self.tokens_url).await?;
        let mut snapshot = snapshot_from_token_data(&entries, &self.index_symbol);

        if snapshot.index.is_none() {
            warn!(
                symbol = %self.index_symbol,
                "index token missing from token data, falling back to flat prices"
            );
            let prices: HashMap<String, Value> = self.fetch_json(&self.prices_url).await?;
            snapshot.index = price_for_address(&prices, tokens.weth.address)
                .map(|p| TokenPrice { min: p, max: p });
        }

        debug!(
            index = ?snapshot.index,
            stables = snapshot.stables.len(),
            funding_rates = ?snapshot.funding_rates,
            "price snapshot fetched"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WETH;

    const TOKENS_PAYLOAD: &str = r#"[
        { "id": "0x82af", "data": { "symbol": "ETH", "minPrice": "1850000000000000000000000000000000", "maxPrice": "1851000000000000000000000000000000", "fundingRate": "21" } },
        { "id": "0xff97", "data": { "symbol": "USDC", "minPrice": "1000000000000000000000000000000", "maxPrice": "1000000000000000000000000000000", "fundingRate": "34" } },
        { "id": "0xfd08", "data": { "symbol": "USDT", "minPrice": "999900000000000000000000000000", "maxPrice": "1000000000000000000000000000000", "fundingRate": 12 } },
        { "id": "0xda10", "data": { "symbol": "DAI", "minPrice": "1000000000000000000000000000000", "maxPrice": "1000000000000000000000000000000" } },
        { "id": "0x2f2a", "data": { "symbol": "BTC", "minPrice": "1", "maxPrice": "1", "fundingRate": "1" } }
    ]"#;

    #[test]
    fn parses_token_data_payload() {
        let entries: Vec<TokenEntry> = serde_json::from_str(TOKENS_PAYLOAD).unwrap();
        let snap = snapshot_from_token_data(&entries, "ETH");

        let index = snap.index.unwrap();
        assert_eq!(index.min, parse_u256("1850000000000000000000000000000000").unwrap());
        assert_eq!(index.max, parse_u256("1851000000000000000000000000000000").unwrap());
        assert_eq!(snap.stables.len(), 3);
        assert_eq!(snap.funding_rates.get(&StableSymbol::Usdt), Some(&12));
        assert_eq!(snap.funding_rates.get(&StableSymbol::Dai), None);
        assert_eq!(snap.cheapest_funding(), Some(StableSymbol::Usdt));
    }

    #[test]
    fn missing_index_symbol_leaves_index_empty() {
        let entries: Vec<TokenEntry> = serde_json::from_str(TOKENS_PAYLOAD).unwrap();
        let snap = snapshot_from_token_data(&entries, "WETH.e");
        assert!(snap.index.is_none());
        assert!(snap.index_price().is_err());
    }

    #[test]
    fn flat_prices_lookup_ignores_key_case() {
        let prices: HashMap<String, Value> = serde_json::from_str(
            r#"{ "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1": "1850000000000000000000000000000000" }"#,
        )
        .unwrap();
        assert_eq!(
            price_for_address(&prices, WETH),
            parse_u256("1850000000000000000000000000000000")
        );
        assert_eq!(price_for_address(&prices, Address::ZERO), None);
    }
}
