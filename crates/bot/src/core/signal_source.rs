//! Strategy signal intake.
//!
//! The upstream strategy exports a candle CSV whose newest row carries the
//! position label (e.g. `LONGING`). Optional shell commands regenerate that
//! export before a `full` cycle.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SignalConfig;
use crate::errors::BotError;

pub struct SignalSource {
    csv_path: PathBuf,
    column: String,
    refresh_commands: Vec<String>,
    refresh_timeout: Duration,
}

impl SignalSource {
    pub fn from_config(config: &SignalConfig) -> Self {
        Self {
            csv_path: PathBuf::from(&config.csv_path),
            column: config.column.clone(),
            refresh_commands: config.refresh_commands.clone(),
            refresh_timeout: Duration::from_secs(config.refresh_timeout_seconds),
        }
    }

    /// Label from the newest row of the export.
    pub async fn latest_label(&self) -> Result<String, BotError> {
        let contents = tokio::fs::read_to_string(&self.csv_path)
            .await
            .map_err(|e| BotError::SignalSource {
                reason: format!("cannot read {}: {e}", self.csv_path.display()),
            })?;
        let label = parse_latest_label(&contents, &self.column)?;
        debug!(path = %self.csv_path.display(), label = %label, "signal read");
        Ok(label)
    }

    /// Run each refresh command in order through `sh -c`. Any non-zero exit
    /// or timeout aborts the refresh.
    pub async fn refresh(&self) -> Result<(), BotError> {
        for cmd in &self.refresh_commands {
            info!(command = %cmd, "refreshing signal export");
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| BotError::SignalSource {
                    reason: format!("cannot spawn `{cmd}`: {e}"),
                })?;

            let status = tokio::time::timeout(self.refresh_timeout, child.wait())
                .await
                .map_err(|_| BotError::SignalSource {
                    reason: format!(
                        "`{cmd}` did not finish within {}s",
                        self.refresh_timeout.as_secs()
                    ),
                })??;

            if !status.success() {
                return Err(BotError::SignalSource {
                    reason: format!("`{cmd}` exited with {status}"),
                });
            }
        }
        Ok(())
    }
}

/// Value of `column` in the last non-empty row of a CSV document.
///
/// Quoted fields may contain commas; the header match is case-insensitive.
pub fn parse_latest_label(contents: &str, column: &str) -> Result<String, BotError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(BotError::SignalSource {
            reason: "signal export is empty".into(),
        });
    }
    let index = headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(column))
        .ok_or_else(|| BotError::SignalSource {
            reason: format!("column {column:?} not found in header"),
        })?;

    let mut last = None;
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().any(|field| !field.is_empty()) {
            last = Some(record);
        }
    }
    let last = last.ok_or_else(|| BotError::SignalSource {
        reason: "signal export has no data rows".into(),
    })?;

    match last.get(index) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(BotError::SignalSource {
            reason: format!("newest row has no {column:?} value"),
        }),
    }
}

fn csv_error(e: csv::Error) -> BotError {
    BotError::SignalSource {
        reason: format!("malformed signal export: {e}"),
    }
}
