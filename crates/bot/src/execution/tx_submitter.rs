//! Transaction submitter: simulation, local signing, submission and
//! inclusion polling.
//!
//! Signs legacy transactions locally and sends raw bytes, so the RPC never
//! sees the key. Nonce state is cached behind an async mutex and re-read from
//! chain whenever a send fails.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransactionTiming;
use crate::errors::BotError;
use crate::types::TxOutcome;

use super::chain_client::HttpProvider;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `Error(string)` selector: `keccak256("Error(string)")[0..4]`.
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)` selector: `keccak256("Panic(uint256)")[0..4]`.
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Gas price buffer over the node's quote, in percent.
const GAS_PRICE_BUFFER_PCT: u128 = 110;

/// Gas limit buffer over the estimate, in percent. Arbitrum estimates move
/// with L1 calldata cost between estimate and inclusion.
const GAS_LIMIT_BUFFER_PCT: u64 = 120;

/// Marker used as `tx_hash` for reverts caught before broadcast.
const NOT_BROADCAST: &str = "not broadcast";

// ---------------------------------------------------------------------------
// TransactionSigner
// ---------------------------------------------------------------------------

/// Write-side capability: everything the core needs to move a request
/// on-chain. Reads go through `ChainClient`.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Account that signs and pays.
    fn address(&self) -> Address;

    /// `eth_call` the request; a revert becomes `TxReverted` with the decoded reason.
    async fn simulate(&self, tx: &TransactionRequest) -> Result<(), BotError>;

    /// Current gas price in whole gwei, buffer included.
    async fn gas_price_gwei(&self) -> Result<u64, BotError>;

    /// Sign and broadcast. Returns the transaction hash.
    async fn send(&self, tx: TransactionRequest) -> Result<B256, BotError>;

    /// Poll until the transaction is included, reverted, timed out or cancelled.
    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        shutdown: &CancellationToken,
    ) -> Result<TxOutcome, BotError>;
}

// ---------------------------------------------------------------------------
// TxSubmitter
// ---------------------------------------------------------------------------

/// Local-key [`TransactionSigner`] over an HTTP provider.
pub struct TxSubmitter {
    provider: HttpProvider,
    signer: PrivateKeySigner,
    /// `None` until first chain query, and again after a failed send.
    nonce: Mutex<Option<u64>>,
    simulation_timeout: Duration,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    chain_id: u64,
}

impl TxSubmitter {
    pub fn new(
        provider: HttpProvider,
        signer: PrivateKeySigner,
        timing: &TransactionTiming,
        chain_id: u64,
    ) -> Self {
        info!(
            address = %signer.address(),
            chain_id,
            simulation_timeout = timing.simulation_timeout_seconds,
            confirmation_timeout = timing.confirmation_timeout_seconds,
            "TxSubmitter initialized"
        );

        Self {
            provider,
            signer,
            nonce: Mutex::new(None),
            simulation_timeout: Duration::from_secs(timing.simulation_timeout_seconds),
            confirmation_timeout: Duration::from_secs(timing.confirmation_timeout_seconds),
            poll_interval: Duration::from_millis(timing.receipt_poll_interval_ms),
            chain_id,
        }
    }

    // -----------------------------------------------------------------------
    // Revert decoding
    // -----------------------------------------------------------------------

    /// Decode a Solidity revert reason from raw return data.
    ///
    /// Handles `Error(string)` and `Panic(uint256)`; anything else is hex.
    pub fn decode_revert_reason(data: &[u8]) -> String {
        if data.is_empty() {
            return "Unknown revert".into();
        }

        if data.len() < 4 {
            return hex::encode(data);
        }

        // Error(string): selector(4) + offset(32) + length(32) + data
        if data[..4] == ERROR_SELECTOR && data.len() >= 68 {
            if let Ok(len_bytes) = <[u8; 8]>::try_from(&data[60..68]) {
                let end = usize::try_from(u64::from_be_bytes(len_bytes))
                    .ok()
                    .and_then(|len| 68usize.checked_add(len))
                    .filter(|end| *end <= data.len());
                if let Some(end) = end {
                    return String::from_utf8_lossy(&data[68..end]).into_owned();
                }
            }
        }

        // Panic(uint256): selector(4) + code(32)
        if data[..4] == PANIC_SELECTOR && data.len() >= 36 {
            let code = U256::from_be_slice(&data[4..36]);
            return match u64::try_from(code).unwrap_or(u64::MAX) {
                0x01 => "Panic: assertion failed".into(),
                0x11 => "Panic: arithmetic overflow/underflow".into(),
                0x12 => "Panic: division by zero".into(),
                0x21 => "Panic: enum conversion out of range".into(),
                0x31 => "Panic: pop on empty array".into(),
                0x32 => "Panic: array index out of bounds".into(),
                0x41 => "Panic: too much memory allocated".into(),
                _ => format!("Panic(0x{code:x})"),
            };
        }

        hex::encode(data)
    }

    /// Revert reason from an RPC error, decoded when the node returned data.
    fn revert_reason(e: &alloy::transports::TransportError) -> String {
        match e.as_error_resp().and_then(|payload| payload.as_revert_data()) {
            Some(data) => Self::decode_revert_reason(&data),
            None => e.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn buffered_gas_price(&self) -> Result<u128, BotError> {
        let base = self.provider.get_gas_price().await?;
        Ok(buffer_gas_price(base))
    }

    /// Get the next nonce, initialising from chain on the first call.
    async fn next_nonce(&self, guard: &mut Option<u64>) -> Result<u64, BotError> {
        let nonce = match *guard {
            Some(n) => n,
            None => {
                let n = self
                    .provider
                    .get_transaction_count(self.signer.address())
                    .await?;
                debug!(nonce = n, "nonce initialized from chain");
                n
            }
        };
        *guard = Some(nonce + 1);
        Ok(nonce)
    }

    /// Build a legacy transaction, sign it locally and submit raw bytes.
    async fn sign_and_send(
        &self,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        to: TxKind,
        value: U256,
        input: Bytes,
    ) -> Result<B256, BotError> {
        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            input,
        };

        let sig_hash = tx.signature_hash();
        let sig = self
            .signer
            .sign_hash_sync(&sig_hash)
            .map_err(|e| BotError::Config(format!("transaction signing failed: {e}")))?;

        let envelope = TxEnvelope::Legacy(tx.into_signed(sig));
        let raw = envelope.encoded_2718();

        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl TransactionSigner for TxSubmitter {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn simulate(&self, tx: &TransactionRequest) -> Result<(), BotError> {
        let provider = &self.provider;
        let tx_clone = tx.clone();
        match tokio::time::timeout(self.simulation_timeout, async move {
            provider.call(tx_clone).await
        })
        .await
        {
            Ok(Ok(output)) => {
                debug!(output_len = output.len(), "simulation succeeded");
                Ok(())
            }
            Ok(Err(e)) => Err(BotError::TxReverted {
                tx_hash: NOT_BROADCAST.into(),
                reason: format!("simulation reverted: {}", Self::revert_reason(&e)),
            }),
            Err(_) => Err(BotError::NetworkError {
                reason: format!(
                    "simulation timed out after {}s",
                    self.simulation_timeout.as_secs()
                ),
            }),
        }
    }

    async fn gas_price_gwei(&self) -> Result<u64, BotError> {
        Ok(wei_to_gwei(self.buffered_gas_price().await?))
    }

    async fn send(&self, tx: TransactionRequest) -> Result<B256, BotError> {
        let gas_price = self.buffered_gas_price().await?;

        let gas_limit = match tx.gas {
            Some(gas) => gas,
            None => {
                let estimate = self.provider.estimate_gas(tx.clone()).await.map_err(|e| {
                    BotError::TxReverted {
                        tx_hash: NOT_BROADCAST.into(),
                        reason: format!("gas estimation failed: {}", Self::revert_reason(&e)),
                    }
                })?;
                buffer_gas_limit(estimate)
            }
        };

        let to = tx.to.unwrap_or(TxKind::Create);
        let value = tx.value.unwrap_or_default();
        let input = tx.input.into_input().unwrap_or_default();

        let mut guard = self.nonce.lock().await;
        let nonce = self.next_nonce(&mut guard).await?;

        match self
            .sign_and_send(nonce, gas_price, gas_limit, to, value, input)
            .await
        {
            Ok(tx_hash) => {
                info!(tx_hash = %tx_hash, nonce, gas_price, gas_limit, "transaction submitted");
                Ok(tx_hash)
            }
            Err(e) => {
                // Unknown whether the node accepted it: re-sync on next send.
                *guard = None;
                warn!(nonce, error = %e, "send failed, nonce cache cleared");
                Err(e)
            }
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        shutdown: &CancellationToken,
    ) -> Result<TxOutcome, BotError> {
        let start = tokio::time::Instant::now();

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(BotError::TxReverted {
                            tx_hash: tx_hash.to_string(),
                            reason: "transaction reverted on-chain".into(),
                        });
                    }
                    info!(
                        tx_hash = %tx_hash,
                        block = ?receipt.block_number,
                        gas_used = receipt.gas_used,
                        "transaction confirmed"
                    );
                    return Ok(TxOutcome {
                        tx_hash,
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, tx_hash = %tx_hash, "receipt poll error, retrying");
                }
            }

            if start.elapsed() >= self.confirmation_timeout {
                return Err(BotError::TxTimeout {
                    tx_hash: tx_hash.to_string(),
                    timeout_seconds: self.confirmation_timeout.as_secs(),
                });
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    return Err(BotError::Cancelled { stage: "inclusion wait" });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

fn buffer_gas_price(base: u128) -> u128 {
    (base * GAS_PRICE_BUFFER_PCT / 100).max(1)
}

fn buffer_gas_limit(estimate: u64) -> u64 {
    estimate.saturating_mul(GAS_LIMIT_BUFFER_PCT) / 100
}

fn wei_to_gwei(wei: u128) -> u64 {
    u64::try_from(wei / 1_000_000_000).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
