use alloy::primitives::U256;
use thiserror::Error;

use crate::types::ReconciledAction;

/// Typed error hierarchy for the GMX position bot.
///
/// Library-internal errors use specific variants; application code wraps with
/// `anyhow::Context` for propagation.
#[derive(Error, Debug)]
pub enum BotError {
    // -- Signal -------------------------------------------------------------
    #[error("unrecognized signal label: {label:?}")]
    UnrecognizedSignal { label: String },

    #[error("signal source error: {reason}")]
    SignalSource { reason: String },

    // -- Position state -----------------------------------------------------
    #[error("malformed aggregator response: {reason}")]
    MalformedResponse { reason: String },

    #[error("ambiguous position state: long size {long_size} and short size {short_size} both open")]
    AmbiguousPositionState { long_size: U256, short_size: U256 },

    // -- Planning -----------------------------------------------------------
    #[error("insufficient balance: {reason}")]
    InsufficientBalance { reason: String },

    #[error("price unavailable for {token}")]
    PriceUnavailable { token: String },

    // -- Execution ----------------------------------------------------------
    #[error("transaction reverted: {reason} (tx: {tx_hash})")]
    TxReverted { tx_hash: String, reason: String },

    #[error("transaction timed out after {timeout_seconds}s (tx: {tx_hash})")]
    TxTimeout { tx_hash: String, timeout_seconds: u64 },

    #[error("execution not confirmed: {action} expected {expected}, observed size {observed_size}")]
    ExecutionNotConfirmed {
        action: ReconciledAction,
        expected: &'static str,
        observed_size: U256,
    },

    // -- Network ------------------------------------------------------------
    #[error("network error: {reason}")]
    NetworkError { reason: String },

    // -- Safety -------------------------------------------------------------
    #[error("safety gate blocked: {reason}")]
    SafetyBlocked { reason: String },

    // -- Cycle --------------------------------------------------------------
    #[error("cycle exceeded its {timeout_seconds}s budget")]
    CycleTimeout { timeout_seconds: u64 },

    #[error("cancelled during {stage}")]
    Cancelled { stage: &'static str },

    // -- Configuration ------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Only transport-level failures are worth repeating. Everything else
    /// reflects state that a second attempt would observe again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::NetworkError { .. })
    }

    /// Stable variant name used in abort reports and alerts.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::UnrecognizedSignal { .. } => "UnrecognizedSignal",
            BotError::SignalSource { .. } => "SignalSource",
            BotError::MalformedResponse { .. } => "MalformedResponse",
            BotError::AmbiguousPositionState { .. } => "AmbiguousPositionState",
            BotError::InsufficientBalance { .. } => "InsufficientBalance",
            BotError::PriceUnavailable { .. } => "PriceUnavailable",
            BotError::TxReverted { .. } => "TxReverted",
            BotError::TxTimeout { .. } => "TxTimeout",
            BotError::ExecutionNotConfirmed { .. } => "ExecutionNotConfirmed",
            BotError::NetworkError { .. } => "NetworkError",
            BotError::SafetyBlocked { .. } => "SafetyBlocked",
            BotError::CycleTimeout { .. } => "CycleTimeout",
            BotError::Cancelled { .. } => "Cancelled",
            BotError::Config(_) => "Config",
            BotError::Io(_) => "Io",
        }
    }
}

impl From<alloy::transports::TransportError> for BotError {
    fn from(e: alloy::transports::TransportError) -> Self {
        BotError::NetworkError {
            reason: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::NetworkError {
            reason: e.to_string(),
        }
    }
}

/// Classify a contract read failure: transport problems are retryable,
/// ABI decode problems mean the node returned something we cannot trust.
pub fn from_contract_error(call: &str, e: alloy::contract::Error) -> BotError {
    match e {
        alloy::contract::Error::TransportError(inner) => BotError::NetworkError {
            reason: format!("{call}: {inner}"),
        },
        other => BotError::MalformedResponse {
            reason: format!("{call}: {other}"),
        },
    }
}
