use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::analysis::Analysis;
use crate::config::CoreConfig;
use crate::services::dispatch;
use crate::store::StatusStore;

const PING_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Whether the current wake tick falls inside a fetch window.
///
/// Windows are anchored to the Unix epoch so overlapping or restarted driver
/// processes agree on them: a round starts in the first `sleep_secs` of every
/// `pull_secs` period, and the driver wakes once per `sleep_secs`, so exactly
/// one wake per period lands inside the window.
fn fetch_window_open(epoch_secs: i64, pull_secs: i64, sleep_secs: i64) -> bool {
    epoch_secs % pull_secs.max(1) <= sleep_secs
}

/// Owns the long-running fetch loop: wake, run a dispatch round when the
/// window is open, sleep, repeat until cancelled.
pub struct PeriodicDriver {
    config: CoreConfig,
    units: Vec<Arc<dyn Analysis>>,
    store: StatusStore,
    http: reqwest::Client,
}

impl PeriodicDriver {
    pub fn new(
        config: CoreConfig,
        units: Vec<Arc<dyn Analysis>>,
        store: StatusStore,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            units,
            store,
            http,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let pull_secs = i64::from(self.config.pull_interval_minutes) * 60;
        let sleep_secs = self.config.sleep_interval_seconds as i64;
        tracing::info!(
            pull_interval_minutes = self.config.pull_interval_minutes,
            sleep_interval_seconds = self.config.sleep_interval_seconds,
            units = self.units.len(),
            "driver started"
        );

        while !cancel.is_cancelled() {
            let now = Utc::now();
            if fetch_window_open(now.timestamp(), pull_secs, sleep_secs) {
                self.ping("/start").await;
                let summary = dispatch::run_due(
                    &self.units,
                    &self.store,
                    self.config.pull_interval_minutes,
                    now,
                )
                .await;
                tracing::info!(
                    fetched = summary.fetched,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "fetch round complete"
                );
                self.ping("").await;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.sleep_interval()) => {}
            }
        }

        tracing::info!("driver stopped");
        Ok(())
    }

    /// Outbound liveness ping. A no-op in debug mode or with no URL
    /// configured; failures are logged, never propagated.
    async fn ping(&self, suffix: &str) {
        if self.config.debug_mode {
            return;
        }
        let Some(base) = &self.config.healthcheck_ping_url else {
            return;
        };
        let url = format!("{base}{suffix}");
        match self.http.get(&url).timeout(PING_TIMEOUT).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(url = %url, status = %response.status(), "liveness ping rejected");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "liveness ping failed");
            }
        }
    }
}
