use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

use crate::analysis::Analysis;
use crate::services::schedule;
use crate::status::Severity;
use crate::store::StatusStore;

/// What one dispatch round did across all units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchSummary {
    fn merge(&mut self, other: DispatchSummary) {
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Run one fetch round over `units` at `now`.
///
/// Units run concurrently, one task each; instances within a unit run in
/// order. A failing instance never takes down the round: fetch and persist
/// errors are logged with the full instance identity and recorded as a
/// technical-issue status at `now`, then the round moves on. Instances whose
/// cadence is not due this tick are skipped.
pub async fn run_due(
    units: &[Arc<dyn Analysis>],
    store: &StatusStore,
    pull_interval_minutes: u32,
    now: DateTime<Utc>,
) -> DispatchSummary {
    let tasks: Vec<_> = units
        .iter()
        .map(|unit| {
            let unit = unit.clone();
            let store = store.clone();
            tokio::spawn(async move { run_unit(unit, store, pull_interval_minutes, now).await })
        })
        .collect();

    let mut summary = DispatchSummary::default();
    for result in join_all(tasks).await {
        match result {
            Ok(unit_summary) => summary.merge(unit_summary),
            Err(err) => {
                tracing::error!(error = %err, "analysis task panicked");
                summary.failed += 1;
            }
        }
    }
    summary
}

async fn run_unit(
    unit: Arc<dyn Analysis>,
    store: StatusStore,
    pull_interval_minutes: u32,
    now: DateTime<Utc>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    for instance in unit.instances() {
        if !schedule::is_due(now, pull_interval_minutes, instance.pull_multiplier) {
            tracing::debug!(
                analysis = %unit.name(),
                instance = %instance.name,
                pull_multiplier = instance.pull_multiplier,
                "not due this tick"
            );
            summary.skipped += 1;
            continue;
        }

        match unit.fetch(instance).await {
            Ok(Some(data)) => match unit.persist(data, instance).await {
                Ok(outcome) => {
                    if let Some(status) = outcome.status {
                        record_status(&store, instance, outcome.time.unwrap_or(now), status);
                    }
                    summary.fetched += 1;
                }
                Err(err) => {
                    tracing::error!(
                        analysis = %unit.name(),
                        instance = %instance.name,
                        verbose_name = %instance.verbose_name,
                        error = %format!("{err:#}"),
                        "persist failed"
                    );
                    record_status(&store, instance, now, Severity::TechnicalIssue);
                    summary.failed += 1;
                }
            },
            Ok(None) => {
                tracing::error!(
                    analysis = %unit.name(),
                    instance = %instance.name,
                    verbose_name = %instance.verbose_name,
                    "source returned no usable data"
                );
                record_status(&store, instance, now, Severity::TechnicalIssue);
                summary.failed += 1;
            }
            Err(err) => {
                tracing::error!(
                    analysis = %unit.name(),
                    instance = %instance.name,
                    verbose_name = %instance.verbose_name,
                    error = %format!("{err:#}"),
                    "fetch failed"
                );
                record_status(&store, instance, now, Severity::TechnicalIssue);
                summary.failed += 1;
            }
        }
    }
    summary
}

fn record_status(
    store: &StatusStore,
    instance: &crate::analysis::InstanceConfig,
    time: DateTime<Utc>,
    status: Severity,
) {
    if let Err(err) = store.upsert(time, &instance.name, &instance.category, status) {
        tracing::error!(
            instance = %instance.name,
            error = %format!("{err:#}"),
            "failed to record status"
        );
    }
}
