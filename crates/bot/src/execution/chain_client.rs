//! Read-only chain access for the GMX bot.
//!
//! [`ChainClient`] is the capability the core depends on for reads;
//! [`GmxChainClient`] backs it with typed Alloy contract calls over one
//! shared HTTP provider.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;

use crate::errors::{from_contract_error, BotError};
use crate::types::GmxContracts;

use super::contracts::{IPositionRouter, IReader, IERC20};

/// Concrete provider type: Alloy HTTP provider over Ethereum network.
pub type HttpProvider = RootProvider;

/// On-chain reads needed by a cycle.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Raw `Reader.getPositions` output against the configured vault.
    async fn get_positions(
        &self,
        account: Address,
        collateral_tokens: Vec<Address>,
        index_tokens: Vec<Address>,
        is_long: Vec<bool>,
    ) -> Result<Vec<U256>, BotError>;

    /// `PositionRouter.minExecutionFee()` in wei.
    async fn min_execution_fee(&self) -> Result<U256, BotError>;

    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, BotError>;

    async fn native_balance(&self, account: Address) -> Result<U256, BotError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BotError>;

    /// `Reader.getAmountOut` through the vault, net of swap fees.
    async fn amount_out(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<U256, BotError>;
}

/// Alloy-backed [`ChainClient`].
pub struct GmxChainClient {
    provider: HttpProvider,
    reader: IReader::IReaderInstance<HttpProvider>,
    position_router: IPositionRouter::IPositionRouterInstance<HttpProvider>,
    vault: Address,
}

impl GmxChainClient {
    pub fn new(provider: HttpProvider, contracts: &GmxContracts) -> Self {
        Self {
            reader: IReader::new(contracts.reader, provider.clone()),
            position_router: IPositionRouter::new(contracts.position_router, provider.clone()),
            vault: contracts.vault,
            provider,
        }
    }
}

#[async_trait]
impl ChainClient for GmxChainClient {
    async fn get_positions(
        &self,
        account: Address,
        collateral_tokens: Vec<Address>,
        index_tokens: Vec<Address>,
        is_long: Vec<bool>,
    ) -> Result<Vec<U256>, BotError> {
        self.reader
            .getPositions(self.vault, account, collateral_tokens, index_tokens, is_long)
            .call()
            .await
            .map_err(|e| from_contract_error("getPositions", e))
    }

    async fn min_execution_fee(&self) -> Result<U256, BotError> {
        self.position_router
            .minExecutionFee()
            .call()
            .await
            .map_err(|e| from_contract_error("minExecutionFee", e))
    }

    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, BotError> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| from_contract_error("balanceOf", e))
    }

    async fn native_balance(&self, account: Address) -> Result<U256, BotError> {
        Ok(self.provider.get_balance(account).await?)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BotError> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| from_contract_error("allowance", e))
    }

    async fn amount_out(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<U256, BotError> {
        let out = self
            .reader
            .getAmountOut(self.vault, token_in, token_out, amount_in)
            .call()
            .await
            .map_err(|e| from_contract_error("getAmountOut", e))?;
        Ok(out._0)
    }
}
