use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::config::AlertConfig;
use crate::core::cycle::CycleFailure;
use crate::types::fixed_point::usd_to_decimal;

/// Alert channel for aborted cycles. Always logs at error level; posts to a
/// webhook when one is configured. Delivery failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct Alerter {
    webhook: Option<Webhook>,
}

#[derive(Debug, Clone)]
struct Webhook {
    http: reqwest::Client,
    url: String,
}

impl Alerter {
    pub fn from_config(config: Option<&AlertConfig>) -> Self {
        let webhook = config.filter(|c| c.enabled).and_then(|c| {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(c.timeout_seconds))
                .build();
            match http {
                Ok(http) => Some(Webhook {
                    http,
                    url: c.webhook_url.clone(),
                }),
                Err(e) => {
                    warn!(error = %e, "alert webhook client unavailable, logging only");
                    None
                }
            }
        });
        Self { webhook }
    }

    /// Log-only alerter.
    pub fn disabled() -> Self {
        Self { webhook: None }
    }

    pub async fn cycle_failed(&self, failure: &CycleFailure) {
        error!(
            error_kind = failure.error.kind(),
            action = ?failure.action,
            long_size = ?failure.snapshot.as_ref().map(|p| p.long.size),
            short_size = ?failure.snapshot.as_ref().map(|p| p.short.size),
            error = %failure.error,
            "cycle aborted"
        );
        self.send(&format_failure(failure)).await;
    }

    async fn send(&self, message: &str) {
        let Some(hook) = &self.webhook else {
            return;
        };
        let body = json!({ "text": message });
        match hook.http.post(&hook.url).json(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = %resp.status(), "alert webhook returned non-2xx");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to deliver alert"),
        }
    }
}

pub fn format_failure(failure: &CycleFailure) -> String {
    let action = failure
        .action
        .map(|a| a.to_string())
        .unwrap_or_else(|| "none".into());
    let snapshot = match &failure.snapshot {
        Some(p) => format!(
            "long ${} / short ${} ({})",
            usd_to_decimal(p.long.size),
            usd_to_decimal(p.short.size),
            p.short_collateral
        ),
        None => "unavailable".into(),
    };
    format!(
        "*GMX cycle aborted* {}\nError: {} ({})\nAction: {}\nPositions: {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        failure.error,
        failure.error.kind(),
        action,
        snapshot,
    )
}
