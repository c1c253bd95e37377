pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`BotConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   chains/42161.json
///   trading.json
///   timing.json
///   signal.json
///   schedule.json
///   alerts.json   (optional)
/// ```
///
/// # Environment variable overrides
///
/// | Env Var              | Config Field                   |
/// |----------------------|--------------------------------|
/// | `EXECUTOR_DRY_RUN`   | `trading.dry_run`              |
/// | `ARBITRUM_RPC_URL`   | `chain.rpc.http_url`           |
/// | `LEVERAGE`           | `trading.leverage`             |
/// | `MAX_GAS_PRICE_GWEI` | `trading.max_gas_price_gwei`   |
/// | `SIGNAL_CSV_PATH`    | `signal.csv_path`              |
pub fn load_config(config_dir: &Path) -> Result<BotConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let chain: ChainConfig = serde_json::from_str(&read("chains/42161.json")?)
        .context("parsing chains/42161.json")?;

    let trading: TradingConfig =
        serde_json::from_str(&read("trading.json")?).context("parsing trading.json")?;

    let timing: TimingConfig =
        serde_json::from_str(&read("timing.json")?).context("parsing timing.json")?;

    let signal: SignalConfig =
        serde_json::from_str(&read("signal.json")?).context("parsing signal.json")?;

    let schedule: ScheduleConfig =
        serde_json::from_str(&read("schedule.json")?).context("parsing schedule.json")?;

    // Alerts are optional; only a missing file means "no alerts".
    let alerts_path = config_dir.join("alerts.json");
    let alerts: Option<AlertConfig> = match std::fs::read_to_string(&alerts_path) {
        Ok(contents) => Some(serde_json::from_str(&contents).context("parsing alerts.json")?),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to read config file: {}", alerts_path.display())
            })
        }
    };

    let mut config = BotConfig {
        app,
        chain,
        trading,
        timing,
        signal,
        schedule,
        alerts,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Only non-empty env vars take effect. Parse failures are skipped and the
/// JSON value remains.
fn apply_env_overrides(config: &mut BotConfig) {
    // -- Trading -------------------------------------------------------------
    if let Some(val) = env_bool("EXECUTOR_DRY_RUN") {
        info!(dry_run = val, "env override: EXECUTOR_DRY_RUN");
        config.trading.dry_run = val;
    }

    if let Some(val) = env_decimal("LEVERAGE") {
        info!(%val, "env override: LEVERAGE");
        config.trading.leverage = val;
    }

    if let Some(val) = env_parse::<u64>("MAX_GAS_PRICE_GWEI") {
        info!(val, "env override: MAX_GAS_PRICE_GWEI");
        config.trading.max_gas_price_gwei = val;
    }

    // -- Chain ---------------------------------------------------------------
    if let Some(val) = env_string("ARBITRUM_RPC_URL") {
        info!("env override: ARBITRUM_RPC_URL");
        config.chain.rpc.http_url = val;
    }

    // -- Signal --------------------------------------------------------------
    if let Some(val) = env_string("SIGNAL_CSV_PATH") {
        info!(path = %val, "env override: SIGNAL_CSV_PATH");
        config.signal.csv_path = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var as a bool (`true`, `1`, `yes` → true).
fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}
