pub mod alerts;
pub mod balance_reader;
pub mod cycle;
pub mod planner;
pub mod position_reader;
pub mod reconciler;
pub mod safety;
pub mod scheduler;
pub mod signal_source;
pub mod swap;
pub mod trade_submitter;
pub mod verifier;

#[cfg(test)]
pub mod testing;
