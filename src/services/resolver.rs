use chrono::{DateTime, Duration, Utc};

use crate::analysis::InstanceConfig;
use crate::config::CoreConfig;
use crate::status::{Severity, StatusRecord, StatusSeries};
use crate::store::StatusStore;

/// Best-known status series for one instance at `reference`.
///
/// `is_info` instances never touch the store; they always resolve to a single
/// synthetic info record. For everything else the lookup window defaults to
/// the instance's effective polling step whenever the caller passes nothing
/// or something no wider than the base pull interval. An empty lookup (or a
/// store failure) degrades to a synthetic technical-issue record at
/// `reference` rather than an error; callers decide whether that is worth
/// surfacing.
pub fn resolve(
    store: &StatusStore,
    config: &CoreConfig,
    instance: &InstanceConfig,
    reference: DateTime<Utc>,
    window: Option<Duration>,
) -> StatusSeries {
    if instance.is_info {
        return StatusSeries::Synthetic(StatusRecord::synthetic(
            reference,
            &instance.name,
            &instance.category,
            Severity::Info,
        ));
    }

    let window = match window {
        Some(window) if window > config.pull_interval() => window,
        _ => instance.step(config),
    };

    let records = match store.query(&instance.name, &instance.category, reference, window) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(
                instance = %instance.name,
                category = %instance.category,
                error = %format!("{err:#}"),
                "status lookup failed"
            );
            Vec::new()
        }
    };

    if records.is_empty() {
        tracing::warn!(
            instance = %instance.name,
            category = %instance.category,
            reference = %reference,
            window_minutes = window.num_minutes(),
            "no stored status for instance"
        );
        return StatusSeries::Synthetic(StatusRecord::synthetic(
            reference,
            &instance.name,
            &instance.category,
            Severity::TechnicalIssue,
        ));
    }
    StatusSeries::Recorded(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{instance, test_config, test_store};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, h, m, 0).unwrap()
    }

    #[test]
    fn info_instances_bypass_the_store() {
        let store = test_store();
        let config = test_config();
        let mut probe = instance("probe", "Batch");
        probe.is_info = true;
        // Even with a contradicting stored row, info wins.
        store
            .upsert(at(10, 0), "probe", "Batch", Severity::Critical)
            .expect("upsert");

        let series = resolve(&store, &config, &probe, at(10, 0), None);
        assert!(series.is_synthetic());
        assert_eq!(series.latest().status, Severity::Info);
        assert_eq!(series.latest().time, at(10, 0));
    }

    #[test]
    fn empty_lookup_degrades_to_technical_issue() {
        let store = test_store();
        let config = test_config();
        let probe = instance("probe", "Batch");

        let series = resolve(&store, &config, &probe, at(10, 0), None);
        assert!(series.is_synthetic());
        assert_eq!(series.latest().status, Severity::TechnicalIssue);
        assert_eq!(series.latest().time, at(10, 0));
    }

    #[test]
    fn window_defaults_to_the_instance_step() {
        let store = test_store();
        let config = test_config();
        let mut probe = instance("probe", "Batch");
        probe.pull_multiplier = 4; // 60 minute step

        store
            .upsert(at(9, 10), "probe", "Batch", Severity::Warning)
            .expect("upsert");

        // 50 minutes old: outside the base pull interval but inside the step.
        let series = resolve(&store, &config, &probe, at(10, 0), None);
        assert_eq!(series.latest().status, Severity::Warning);

        // An explicit window wider than the pull interval is honored as-is.
        let series = resolve(&store, &config, &probe, at(10, 0), Some(Duration::minutes(20)));
        assert_eq!(series.latest().status, Severity::TechnicalIssue);
    }

    #[test]
    fn narrow_explicit_windows_fall_back_to_the_step() {
        let store = test_store();
        let config = test_config();
        let probe = instance("probe", "Batch");
        store
            .upsert(at(9, 50), "probe", "Batch", Severity::Ok)
            .expect("upsert");

        // 5 minutes <= pull interval, so the effective window is the step.
        let series = resolve(&store, &config, &probe, at(10, 0), Some(Duration::minutes(5)));
        assert_eq!(series.latest().status, Severity::Ok);
        assert_eq!(series.len(), 1);
    }
}
