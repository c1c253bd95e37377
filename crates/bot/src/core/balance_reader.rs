use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::errors::BotError;
use crate::execution::{ChainClient, RetryPolicy};
use crate::types::{BalanceSnapshot, StableSymbol, TokenBook};

/// ERC-20 and native balance reads for the trading account.
pub struct BalanceReader {
    chain: Arc<dyn ChainClient>,
    tokens: TokenBook,
    retry: RetryPolicy,
}

impl BalanceReader {
    pub fn new(chain: Arc<dyn ChainClient>, tokens: TokenBook, retry: RetryPolicy) -> Self {
        Self {
            chain,
            tokens,
            retry,
        }
    }

    /// Raw balances of every configured stable plus native ETH.
    pub async fn read(&self, account: Address) -> Result<BalanceSnapshot, BotError> {
        let mut stables = HashMap::new();
        for symbol in StableSymbol::ALL {
            let token = self.tokens.stable(symbol)?.address;
            let balance = self
                .retry
                .run("balanceOf", || self.chain.token_balance(token, account))
                .await?;
            stables.insert(symbol, balance);
        }

        let native = self
            .retry
            .run("getBalance", || self.chain.native_balance(account))
            .await?;

        debug!(%account, ?stables, %native, "balances read");
        Ok(BalanceSnapshot { stables, native })
    }

    /// Allowance granted by `owner` to `spender` for one stable.
    pub async fn allowance(
        &self,
        symbol: StableSymbol,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BotError> {
        let token = self.tokens.stable(symbol)?.address;
        self.retry
            .run("allowance", || self.chain.allowance(token, owner, spender))
            .await
    }
}
