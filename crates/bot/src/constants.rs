use alloy::primitives::{address, Address, B256};

// ---------------------------------------------------------------------------
// Numeric Constants
// ---------------------------------------------------------------------------

/// GMX v1 USD amounts and prices carry 30 decimals.
pub const USD_DECIMALS: u8 = 30;

/// Native ETH / WETH decimals.
pub const NATIVE_DECIMALS: u8 = 18;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default acceptable-price tolerance: 1%.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;

/// Fields per position record returned by `Reader.getPositions`.
pub const POSITION_FIELD_COUNT: usize = 9;

/// Position records requested per read: one long slot, three stable short slots.
pub const POSITION_SLOT_COUNT: usize = 4;

/// Referral code passed to `createIncreasePosition`.
pub const REFERRAL_CODE: B256 = B256::ZERO;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

pub const ARBITRUM_CHAIN_ID: u64 = 42_161;

// ---------------------------------------------------------------------------
// GMX v1 Arbitrum Addresses
// ---------------------------------------------------------------------------

pub const GMX_POSITION_ROUTER: Address = address!("3d6ba331e3d9702c5e8a8d254e5d8a285f223aba");
pub const GMX_ROUTER: Address = address!("abbc5f99639c9b6bcb58544ddf04efa6802f4064");
pub const GMX_READER: Address = address!("1e904f292ffd165a9f40d37b757fed65ca826058");
pub const GMX_VAULT: Address = address!("489ee077994b6658eafa855c308275ead8097c4a");

// ---------------------------------------------------------------------------
// Arbitrum Token Addresses
// ---------------------------------------------------------------------------

pub const WETH: Address = address!("82af49447d8a07e3bd95bd0d56f35241523fbab1");
pub const USDC: Address = address!("ff970a61a04b1ca14834a43f5de4533ebddb5cc8");
pub const USDT: Address = address!("fd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9");
pub const DAI: Address = address!("da10009cbd5d07dd0cecc66161fc93d7c9000da1");
