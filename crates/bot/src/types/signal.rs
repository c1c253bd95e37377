use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::position::PositionSide;
use crate::errors::BotError;

/// Directional label emitted by the upstream strategy export.
///
/// Parsed once at the boundary; everything downstream works on the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Signal {
    /// Stay flat: any open side should be closed.
    Wait,
    /// Strategy is long: open a long if none is held.
    Longing,
    /// Strategy is short: open a short if none is held.
    Shorting,
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

/// Label prefixes in match order. Two-word labels come first so that
/// `OPEN LONG` is never read as something shorter.
const LABEL_PREFIXES: [(&str, Signal); 7] = [
    ("OPEN LONG", Signal::OpenLong),
    ("OPEN SHORT", Signal::OpenShort),
    ("CLOSE LONG", Signal::CloseLong),
    ("CLOSE SHORT", Signal::CloseShort),
    ("LONGING", Signal::Longing),
    ("SHORTING", Signal::Shorting),
    ("WAIT", Signal::Wait),
];

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wait => "WAIT",
            Self::Longing => "LONGING",
            Self::Shorting => "SHORTING",
            Self::OpenLong => "OPEN LONG",
            Self::OpenShort => "OPEN SHORT",
            Self::CloseLong => "CLOSE LONG",
            Self::CloseShort => "CLOSE SHORT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = BotError;

    /// Case-insensitive prefix match; surrounding whitespace is ignored and
    /// `_` is accepted in place of the space (`OPEN_LONG`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', " ");
        LABEL_PREFIXES
            .iter()
            .find(|(prefix, _)| normalized.starts_with(prefix))
            .map(|(_, signal)| *signal)
            .ok_or_else(|| BotError::UnrecognizedSignal {
                label: s.trim().to_string(),
            })
    }
}

/// What the bot will actually do this cycle after checking the signal
/// against observed position state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReconciledAction {
    NoOp,
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl ReconciledAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOp => "NoOp",
            Self::OpenLong => "OpenLong",
            Self::OpenShort => "OpenShort",
            Self::CloseLong => "CloseLong",
            Self::CloseShort => "CloseShort",
        }
    }

    /// Side touched by this action, `None` for `NoOp`.
    pub fn side(&self) -> Option<PositionSide> {
        match self {
            Self::NoOp => None,
            Self::OpenLong | Self::CloseLong => Some(PositionSide::Long),
            Self::OpenShort | Self::CloseShort => Some(PositionSide::Short),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::OpenLong | Self::OpenShort)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::CloseLong | Self::CloseShort)
    }
}

impl fmt::Display for ReconciledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
