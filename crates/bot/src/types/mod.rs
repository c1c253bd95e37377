pub mod fixed_point;
pub mod market;
pub mod plan;
pub mod position;
pub mod signal;

pub use market::{BalanceSnapshot, GmxContracts, PriceSnapshot, TokenBook, TokenMeta, TokenPrice};
pub use plan::{ExecutionPlan, Submission, TxOutcome, VerificationResult};
pub use position::{Position, PositionPair, PositionSide, StableSymbol};
pub use signal::{ReconciledAction, Signal};
