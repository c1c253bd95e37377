//! In-memory fakes for the chain, signer and price capabilities.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{BotConfig, TradingConfig};
use crate::constants::{DAI, POSITION_FIELD_COUNT, USDC, USDT, WETH};
use crate::core::safety::SafetyState;
use crate::errors::BotError;
use crate::execution::{ChainClient, PriceReader, TransactionSigner};
use crate::types::fixed_point::pow10;
use crate::types::{PriceSnapshot, StableSymbol, TokenBook, TokenMeta, TokenPrice, TxOutcome};

pub const ACCOUNT: Address = Address::repeat_byte(0xAA);

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn usd(n: u64) -> U256 {
    U256::from(n) * pow10(30)
}

pub fn test_tokens() -> TokenBook {
    let mut stables = HashMap::new();
    stables.insert(StableSymbol::Usdc, TokenMeta { address: USDC, decimals: 6 });
    stables.insert(StableSymbol::Usdt, TokenMeta { address: USDT, decimals: 6 });
    stables.insert(StableSymbol::Dai, TokenMeta { address: DAI, decimals: 18 });
    TokenBook {
        weth: TokenMeta { address: WETH, decimals: 18 },
        stables,
    }
}

/// Index quoted at `[min, max]` dollars, every stable at $1.
pub fn test_prices(index_min: u64, index_max: u64) -> PriceSnapshot {
    let mut snap = PriceSnapshot {
        index: Some(TokenPrice {
            min: usd(index_min),
            max: usd(index_max),
        }),
        ..Default::default()
    };
    for (i, symbol) in StableSymbol::ALL.into_iter().enumerate() {
        snap.stables.insert(symbol, TokenPrice { min: usd(1), max: usd(1) });
        snap.funding_rates.insert(symbol, 100 + i as u64);
    }
    snap
}

fn trading_json(dry_run: bool) -> serde_json::Value {
    serde_json::json!({
        "dry_run": dry_run,
        "leverage": "3",
        "slippage_bps": 100,
        "collateral": { "mode": "fixed", "symbol": "USDC" },
        "short_collateral_fallback": "USDC",
        "max_leverage_ratio": "5",
        "max_position_usd": 50000,
        "max_gas_price_gwei": 2,
        "swap_after_close": { "enabled": true, "target": "USDC", "native_reserve_eth": "0.02" }
    })
}

pub fn test_trading_config(dry_run: bool) -> TradingConfig {
    serde_json::from_value(trading_json(dry_run)).expect("valid trading fixture")
}

/// Full configuration with zero keeper grace and fast retries.
pub fn test_bot_config(dry_run: bool) -> BotConfig {
    serde_json::from_value(serde_json::json!({
        "app": { "logging": { "log_dir": "logs" } },
        "chain": {
            "chain_id": 42161,
            "chain_name": "Arbitrum One",
            "rpc": { "http_url": "http://127.0.0.1:8547" },
            "contracts": {
                "position_router": "0x3d6ba331e3d9702c5e8a8d254e5d8a285f223aba",
                "router": "0xabbc5f99639c9b6bcb58544ddf04efa6802f4064",
                "reader": "0x1e904f292ffd165a9f40d37b757fed65ca826058",
                "vault": "0x489ee077994b6658eafa855c308275ead8097c4a"
            },
            "tokens": {
                "WETH": { "address": "0x82af49447d8a07e3bd95bd0d56f35241523fbab1", "decimals": 18 },
                "USDC": { "address": "0xff970a61a04b1ca14834a43f5de4533ebddb5cc8", "decimals": 6 },
                "USDT": { "address": "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9", "decimals": 6 },
                "DAI": { "address": "0xda10009cbd5d07dd0cecc66161fc93d7c9000da1", "decimals": 18 }
            },
            "price_feed": {
                "tokens_url": "http://127.0.0.1:1/tokens",
                "prices_url": "http://127.0.0.1:1/prices",
                "index_symbol": "ETH",
                "timeout_seconds": 1
            }
        },
        "trading": trading_json(dry_run),
        "timing": {
            "transaction": { "confirmation_timeout_seconds": 5, "simulation_timeout_seconds": 5, "receipt_poll_interval_ms": 10 },
            "keeper": { "grace_period_seconds": 0 },
            "cycle": { "budget_seconds": 30 },
            "retry": { "max_retries": 3, "base_delay_ms": 1, "max_delay_ms": 5 }
        },
        "signal": { "csv_path": "data/signals.csv", "column": "POSITION", "refresh_timeout_seconds": 5 },
        "schedule": { "interval_seconds": 60, "start_delay_seconds": 0 },
        "alerts": null
    }))
    .expect("bot config fixture")
}

pub fn test_safety(dry_run: bool) -> SafetyState {
    SafetyState::from_config(&test_trading_config(dry_run))
}

/// Flat `getPositions` output for `[WETH long, USDC short, USDT short, DAI short]`.
pub fn raw_positions(long: U256, shorts: [U256; 3]) -> Vec<U256> {
    let mut words = Vec::with_capacity(POSITION_FIELD_COUNT * 4);
    for size in std::iter::once(long).chain(shorts) {
        let mut record = vec![U256::ZERO; POSITION_FIELD_COUNT];
        record[0] = size;
        record[1] = size / U256::from(3u64);
        words.extend(record);
    }
    words
}

pub fn flat_positions() -> Vec<U256> {
    raw_positions(U256::ZERO, [U256::ZERO; 3])
}

// ---------------------------------------------------------------------------
// FakeChain
// ---------------------------------------------------------------------------

/// Scripted [`ChainClient`]. Position reads are served in order; the last
/// one repeats once the script runs out.
pub struct FakeChain {
    position_reads: Mutex<VecDeque<Vec<U256>>>,
    pub execution_fee: U256,
    pub token_balances: Mutex<HashMap<Address, U256>>,
    pub native: U256,
    pub allowance: U256,
    pub amount_out: U256,
    network_failures: AtomicU32,
    position_calls: AtomicU32,
}

impl FakeChain {
    pub fn new(reads: Vec<Vec<U256>>) -> Self {
        Self {
            position_reads: Mutex::new(reads.into()),
            execution_fee: U256::from(100_000_000_000_000u64),
            token_balances: Mutex::new(HashMap::new()),
            native: U256::ZERO,
            allowance: U256::MAX,
            amount_out: U256::ZERO,
            network_failures: AtomicU32::new(0),
            position_calls: AtomicU32::new(0),
        }
    }

    pub fn with_balance(self, token: Address, amount: U256) -> Self {
        self.token_balances
            .lock()
            .expect("balances lock")
            .insert(token, amount);
        self
    }

    /// Fail the next `n` position reads with a transport error.
    pub fn failing_reads(self, n: u32) -> Self {
        self.network_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn position_calls(&self) -> u32 {
        self.position_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_positions(
        &self,
        _account: Address,
        _collateral_tokens: Vec<Address>,
        _index_tokens: Vec<Address>,
        _is_long: Vec<bool>,
    ) -> Result<Vec<U256>, BotError> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.network_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.network_failures.store(pending - 1, Ordering::SeqCst);
            return Err(BotError::NetworkError {
                reason: "connection reset".into(),
            });
        }

        let mut reads = self.position_reads.lock().expect("reads lock");
        let words = if reads.len() > 1 {
            reads.pop_front()
        } else {
            reads.front().cloned()
        };
        Ok(words.unwrap_or_else(flat_positions))
    }

    async fn min_execution_fee(&self) -> Result<U256, BotError> {
        Ok(self.execution_fee)
    }

    async fn token_balance(&self, token: Address, _account: Address) -> Result<U256, BotError> {
        Ok(self
            .token_balances
            .lock()
            .expect("balances lock")
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn native_balance(&self, _account: Address) -> Result<U256, BotError> {
        Ok(self.native)
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, BotError> {
        Ok(self.allowance)
    }

    async fn amount_out(
        &self,
        _token_in: Address,
        _token_out: Address,
        _amount_in: U256,
    ) -> Result<U256, BotError> {
        Ok(self.amount_out)
    }
}

// ---------------------------------------------------------------------------
// FakeSigner
// ---------------------------------------------------------------------------

/// Records every request instead of signing it.
pub struct FakeSigner {
    gas_gwei: u64,
    revert: Option<String>,
    sent: Mutex<Vec<TransactionRequest>>,
    simulated: AtomicU32,
}

impl FakeSigner {
    pub fn new() -> Self {
        Self::with_gas_gwei(1)
    }

    pub fn with_gas_gwei(gas_gwei: u64) -> Self {
        Self {
            gas_gwei,
            revert: None,
            sent: Mutex::new(Vec::new()),
            simulated: AtomicU32::new(0),
        }
    }

    /// Every simulation reverts with `reason`.
    pub fn reverting(reason: &str) -> Self {
        Self {
            revert: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn simulated(&self) -> u32 {
        self.simulated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSigner for FakeSigner {
    fn address(&self) -> Address {
        ACCOUNT
    }

    async fn simulate(&self, _tx: &TransactionRequest) -> Result<(), BotError> {
        self.simulated.fetch_add(1, Ordering::SeqCst);
        match &self.revert {
            Some(reason) => Err(BotError::TxReverted {
                tx_hash: "not broadcast".into(),
                reason: format!("simulation reverted: {reason}"),
            }),
            None => Ok(()),
        }
    }

    async fn gas_price_gwei(&self) -> Result<u64, BotError> {
        Ok(self.gas_gwei)
    }

    async fn send(&self, tx: TransactionRequest) -> Result<B256, BotError> {
        let mut sent = self.sent.lock().expect("sent lock");
        sent.push(tx);
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        _shutdown: &CancellationToken,
    ) -> Result<TxOutcome, BotError> {
        Ok(TxOutcome {
            tx_hash,
            block_number: Some(1),
            gas_used: 21_000,
        })
    }
}

// ---------------------------------------------------------------------------
// FakePrices
// ---------------------------------------------------------------------------

pub struct FakePrices {
    pub snapshot: PriceSnapshot,
}

#[async_trait]
impl PriceReader for FakePrices {
    async fn snapshot(&self, _tokens: &TokenBook) -> Result<PriceSnapshot, BotError> {
        Ok(self.snapshot.clone())
    }
}

/// Fails the first `failures` snapshots with a transport error.
pub struct FlakyPrices {
    pub snapshot: PriceSnapshot,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl FlakyPrices {
    pub fn new(snapshot: PriceSnapshot, failures: u32) -> Self {
        Self {
            snapshot,
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceReader for FlakyPrices {
    async fn snapshot(&self, _tokens: &TokenBook) -> Result<PriceSnapshot, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(BotError::NetworkError {
                reason: "price index returned 502".into(),
            });
        }
        Ok(self.snapshot.clone())
    }
}
