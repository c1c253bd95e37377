//! Position state reader: one `Reader.getPositions` call per snapshot.
//!
//! The query always asks for four records against the WETH index:
//! `[WETH long, USDC short, USDT short, DAI short]`. The short side is the
//! first stable slot with a non-zero size.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{debug, warn};

use crate::constants::{POSITION_FIELD_COUNT, POSITION_SLOT_COUNT};
use crate::errors::BotError;
use crate::execution::{ChainClient, RetryPolicy};
use crate::types::fixed_point::usd_to_decimal;
use crate::types::{Position, PositionPair, StableSymbol, TokenBook};

pub struct PositionReader {
    chain: Arc<dyn ChainClient>,
    tokens: TokenBook,
    short_fallback: StableSymbol,
    retry: RetryPolicy,
}

impl PositionReader {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        tokens: TokenBook,
        short_fallback: StableSymbol,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            tokens,
            short_fallback,
            retry,
        }
    }

    /// Fresh snapshot of both sides. Transport failures are retried.
    pub async fn read(&self, account: Address) -> Result<PositionPair, BotError> {
        let (collateral, index, is_long) = self.query_layout()?;

        let raw = self
            .retry
            .run("getPositions", || {
                self.chain
                    .get_positions(account, collateral.clone(), index.clone(), is_long.clone())
            })
            .await?;

        if raw.len() > POSITION_FIELD_COUNT * POSITION_SLOT_COUNT {
            warn!(words = raw.len(), "reader returned more records than requested");
        }

        let pair = decode_positions(&raw, self.short_fallback)?;
        debug!(
            %account,
            long_size_usd = %usd_to_decimal(pair.long.size),
            short_size_usd = %usd_to_decimal(pair.short.size),
            short_collateral = %pair.short_collateral,
            "positions read"
        );
        Ok(pair)
    }

    /// Parallel `(collateralTokens, indexTokens, isLong)` arrays for the query.
    fn query_layout(&self) -> Result<(Vec<Address>, Vec<Address>, Vec<bool>), BotError> {
        let weth = self.tokens.weth.address;
        let mut collateral = vec![weth];
        for symbol in StableSymbol::ALL {
            collateral.push(self.tokens.stable(symbol)?.address);
        }
        let index = vec![weth; POSITION_SLOT_COUNT];
        let is_long = vec![true, false, false, false];
        Ok((collateral, index, is_long))
    }
}

/// Decode the reader's flat array into a [`PositionPair`].
///
/// Fails with `MalformedResponse` unless the length is a non-zero multiple
/// of 9. Record 0 is the long; the stable slots that follow are matched to
/// `StableSymbol::ALL` in order, and missing trailing slots read as closed.
pub fn decode_positions(
    raw: &[U256],
    short_fallback: StableSymbol,
) -> Result<PositionPair, BotError> {
    if raw.is_empty() || raw.len() % POSITION_FIELD_COUNT != 0 {
        return Err(BotError::MalformedResponse {
            reason: format!(
                "getPositions returned {} words, not a non-zero multiple of {POSITION_FIELD_COUNT}",
                raw.len()
            ),
        });
    }

    let records: Vec<Position> = raw
        .chunks_exact(POSITION_FIELD_COUNT)
        .map(Position::from_fields)
        .collect();

    let long = records[0].clone();
    let stable_slots = &records[1..records.len().min(POSITION_SLOT_COUNT)];

    let open_short = StableSymbol::ALL
        .iter()
        .zip(stable_slots)
        .find(|(_, position)| position.is_open());

    let (short_collateral, short) = match open_short {
        Some((symbol, position)) => (*symbol, position.clone()),
        None => {
            let short = StableSymbol::ALL
                .iter()
                .position(|s| *s == short_fallback)
                .and_then(|slot| stable_slots.get(slot))
                .cloned()
                .unwrap_or_default();
            (short_fallback, short)
        }
    };

    Ok(PositionPair {
        long,
        short,
        short_collateral,
    })
}
