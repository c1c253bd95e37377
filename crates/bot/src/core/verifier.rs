use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{error, info};

use crate::core::position_reader::PositionReader;
use crate::errors::BotError;
use crate::types::fixed_point::usd_to_decimal;
use crate::types::{PositionPair, ReconciledAction, VerificationResult};

/// Re-reads positions after the keeper grace interval and checks that the
/// actioned side moved the way the plan intended.
pub struct PostTradeVerifier {
    reader: Arc<PositionReader>,
}

impl PostTradeVerifier {
    pub fn new(reader: Arc<PositionReader>) -> Self {
        Self { reader }
    }

    /// Fresh position read once the keeper has had its chance to execute.
    pub async fn reread(&self, account: Address) -> Result<PositionPair, BotError> {
        self.reader.read(account).await
    }

    pub fn verify(
        &self,
        action: ReconciledAction,
        before: &PositionPair,
        after: PositionPair,
    ) -> Result<VerificationResult, BotError> {
        let observed_size = match check_transition(action, &after) {
            Ok(size) => size,
            Err(e) => {
                error!(
                    action = %action,
                    long_before = %before.long.size,
                    short_before = %before.short.size,
                    long_after = %after.long.size,
                    short_after = %after.short.size,
                    "keeper did not execute the request"
                );
                return Err(e);
            }
        };

        info!(
            action = %action,
            size_usd = %usd_to_decimal(observed_size),
            "execution verified"
        );
        Ok(VerificationResult {
            action,
            after,
            observed_size,
        })
    }
}

/// Closed side must read zero; opened side must read non-zero.
/// Returns the actioned side's size after execution.
pub fn check_transition(action: ReconciledAction, after: &PositionPair) -> Result<U256, BotError> {
    let Some(side) = action.side() else {
        return Ok(U256::ZERO);
    };
    let size = after.side(side).size;

    let (ok, expected) = if action.is_close() {
        (size.is_zero(), "size == 0")
    } else {
        (!size.is_zero(), "size > 0")
    };

    if ok {
        Ok(size)
    } else {
        Err(BotError::ExecutionNotConfirmed {
            action,
            expected,
            observed_size: size,
        })
    }
}
