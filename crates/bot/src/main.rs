use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::RootProvider;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gmx_perp_bot::config;
use gmx_perp_bot::constants::NATIVE_DECIMALS;
use gmx_perp_bot::core::cycle::{CycleRunner, StatusReport};
use gmx_perp_bot::core::scheduler::Scheduler;
use gmx_perp_bot::core::signal_source::SignalSource;
use gmx_perp_bot::execution::{GmxChainClient, GmxPriceFeed, TxSubmitter};
use gmx_perp_bot::logging;
use gmx_perp_bot::types::fixed_point::{to_decimal, usd_to_decimal};
use gmx_perp_bot::types::StableSymbol;

/// Signal-driven GMX perpetual position bot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding the JSON config files.
    #[arg(long, env = "BOT_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Never broadcast; log the transactions that would be sent.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One cycle against the current signal export.
    Test,
    /// Refresh the signal export, then run one cycle.
    Full,
    /// Run `full` every interval until Ctrl+C.
    Schedule,
    /// Print positions, balances, allowances and prices without trading.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = config::load_config(&cli.config_dir)?;
    if cli.dry_run {
        config.trading.dry_run = true;
    }

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        chain_id = config.chain.chain_id,
        chain_name = %config.chain.chain_name,
        dry_run = config.trading.dry_run,
        command = ?cli.command,
        "GMX perp bot starting"
    );

    // -----------------------------------------------------------------------
    // Signer and account
    // -----------------------------------------------------------------------

    let (signer, account) = init_signer_and_address(config.trading.dry_run)?;
    info!(signer = %signer.address(), account = %account, "addresses initialized");

    // -----------------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------------

    let rpc_url: Url = config
        .chain
        .rpc
        .http_url
        .parse()
        .context("failed to parse RPC URL")?;
    let provider = RootProvider::new_http(rpc_url);

    let contracts = config.chain.gmx_contracts()?;
    let chain = Arc::new(GmxChainClient::new(provider.clone(), &contracts));
    let prices = Arc::new(GmxPriceFeed::new(&config.chain.price_feed)?);
    let submitter = Arc::new(TxSubmitter::new(
        provider,
        signer,
        &config.timing.transaction,
        config.chain.chain_id,
    ));

    let runner = Arc::new(
        CycleRunner::from_config(&config, chain, prices, submitter, account)
            .context("failed to wire cycle runner")?,
    );
    let source = Arc::new(SignalSource::from_config(&config.signal));

    info!("all components initialized");

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    match cli.command {
        Command::Test => {
            let report = runner.run_once(&source, &shutdown).await?;
            info!(action = %report.action, "test cycle finished");
        }
        Command::Full => {
            let report = runner.run_full(&source, &shutdown).await?;
            info!(action = %report.action, "full cycle finished");
        }
        Command::Schedule => {
            let scheduler = Scheduler::new(runner, source, &config.schedule, shutdown);
            info!("scheduler running, press Ctrl+C to stop");
            scheduler.run().await;
        }
        Command::Status => {
            let status = runner.status().await.context("status read failed")?;
            print_status(&status);
        }
    }

    info!("shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Initialization helpers
// ---------------------------------------------------------------------------

/// Initialize the transaction signer and position owner from the environment.
///
/// In dry-run mode a missing `TRADING_PRIVATE_KEY` yields an ephemeral
/// signer. `ACCOUNT_ADDRESS` lets a dry run watch another wallet; live runs
/// always trade the signer's own account.
fn init_signer_and_address(dry_run: bool) -> Result<(PrivateKeySigner, Address)> {
    let signer = match std::env::var("TRADING_PRIVATE_KEY")
        .ok()
        .filter(|v| !v.is_empty())
    {
        Some(key) => {
            let key = key.strip_prefix("0x").unwrap_or(&key);
            key.parse::<PrivateKeySigner>()
                .context("failed to parse TRADING_PRIVATE_KEY")?
        }
        None => {
            if !dry_run {
                anyhow::bail!("TRADING_PRIVATE_KEY is required in live mode");
            }
            info!("no private key set, generating ephemeral signer (dry run)");
            PrivateKeySigner::random()
        }
    };

    let override_account = std::env::var("ACCOUNT_ADDRESS")
        .ok()
        .filter(|v| !v.is_empty())
        .map(|addr| {
            addr.parse::<Address>()
                .context("failed to parse ACCOUNT_ADDRESS")
        })
        .transpose()?;

    let account = match override_account {
        Some(addr) if dry_run => addr,
        Some(addr) if addr != signer.address() => {
            anyhow::bail!(
                "ACCOUNT_ADDRESS {addr} differs from the signer {} in live mode",
                signer.address()
            );
        }
        _ => signer.address(),
    };

    Ok((signer, account))
}

/// Cancel `shutdown` on the first Ctrl+C.
fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received, stopping gracefully...");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
        }
    });
}

fn print_status(status: &StatusReport) {
    println!("account            {}", status.account);
    println!(
        "execution fee      {} ETH",
        to_decimal(status.execution_fee, NATIVE_DECIMALS, 6)
    );

    match status.prices.index {
        Some(index) => println!(
            "ETH price          {} / {}",
            usd_to_decimal(index.min),
            usd_to_decimal(index.max)
        ),
        None => warn!("index price missing from the price feed"),
    }

    for (label, position) in [("long", &status.positions.long), ("short", &status.positions.short)] {
        println!(
            "{label:<5} position     size ${} collateral ${} avg ${}",
            usd_to_decimal(position.size),
            usd_to_decimal(position.collateral),
            usd_to_decimal(position.average_price),
        );
    }
    println!("short collateral   {}", status.positions.short_collateral);
    println!("native balance     {} ETH", to_decimal(status.balances.native, NATIVE_DECIMALS, 6));

    for symbol in StableSymbol::ALL {
        let Ok(token) = status.tokens.stable(symbol) else {
            continue;
        };
        let rate = status
            .prices
            .funding_rates
            .get(&symbol)
            .map_or_else(|| "-".to_string(), u64::to_string);
        println!(
            "{:<5} balance {:>14}  allowance {:>14}  funding {}",
            symbol,
            to_decimal(status.balances.stable(symbol), token.decimals, 2),
            to_decimal(
                status.allowances.get(&symbol).copied().unwrap_or_default(),
                token.decimals,
                2
            ),
            rate,
        );
    }
}
