pub mod chain_client;
pub mod contracts;
pub mod price_feed;
pub mod retry;
pub mod tx_submitter;

pub use chain_client::{ChainClient, GmxChainClient, HttpProvider};
pub use price_feed::{GmxPriceFeed, PriceReader};
pub use retry::RetryPolicy;
pub use tx_submitter::{TransactionSigner, TxSubmitter};
