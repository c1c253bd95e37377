//! Signal reconciliation: merge the strategy's label with observed state.
//!
//! Pure and synchronous. The only inputs are the parsed [`Signal`] and the
//! freshly read [`PositionPair`]; nothing is remembered between cycles.

use crate::errors::BotError;
use crate::types::{PositionPair, PositionSide, ReconciledAction, Signal};

/// Decide the single action for this cycle.
///
/// Rules, in order:
/// 1. Both sides open is an anomaly and aborts the cycle.
/// 2. `Wait` closes whichever side is open.
/// 3. `Longing`/`Shorting` and the explicit `Open*` labels open their side
///    only when that side is closed. The opposite side is not consulted.
/// 4. Explicit `Close*` labels close their side only when it is open.
/// 5. Everything else holds.
pub fn reconcile(signal: Signal, positions: &PositionPair) -> Result<ReconciledAction, BotError> {
    if positions.is_hedged() {
        return Err(BotError::AmbiguousPositionState {
            long_size: positions.long.size,
            short_size: positions.short.size,
        });
    }

    let long_open = positions.long.is_open();
    let short_open = positions.short.is_open();

    let action = match signal {
        Signal::Wait if long_open => ReconciledAction::CloseLong,
        Signal::Wait if short_open => ReconciledAction::CloseShort,
        Signal::Wait => ReconciledAction::NoOp,

        Signal::Longing | Signal::OpenLong => open_if_closed(PositionSide::Long, positions),
        Signal::Shorting | Signal::OpenShort => open_if_closed(PositionSide::Short, positions),

        Signal::CloseLong if long_open => ReconciledAction::CloseLong,
        Signal::CloseShort if short_open => ReconciledAction::CloseShort,
        Signal::CloseLong | Signal::CloseShort => ReconciledAction::NoOp,
    };

    Ok(action)
}

/// Parse a raw label and reconcile it in one step.
pub fn reconcile_label(label: &str, positions: &PositionPair) -> Result<ReconciledAction, BotError> {
    reconcile(label.parse()?, positions)
}

fn open_if_closed(side: PositionSide, positions: &PositionPair) -> ReconciledAction {
    if positions.side(side).is_open() {
        return ReconciledAction::NoOp;
    }
    match side {
        PositionSide::Long => ReconciledAction::OpenLong,
        PositionSide::Short => ReconciledAction::OpenShort,
    }
}
