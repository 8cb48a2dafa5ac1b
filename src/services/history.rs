use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;

use crate::analysis::{Analysis, InstanceConfig};
use crate::config::CoreConfig;
use crate::status::Severity;
use crate::store::StatusStore;

/// Backward search depth. Fixed by contract; callers that need a different
/// depth wrap this module.
pub const MAX_HISTORY_STEPS: u32 = 8;

/// How far behind the requested time the displayed data actually is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staleness {
    pub hours: i64,
    pub minutes: i64,
}

impl Staleness {
    fn from_lag(lag: Duration) -> Self {
        let seconds = lag.num_seconds();
        Self {
            hours: seconds / 3600,
            minutes: (seconds / 60) % 60,
        }
    }
}

/// Everything a status page needs for one instance at one point in time.
#[derive(Debug, Clone)]
pub struct InstancePage {
    pub status: Severity,
    /// Present only when data was found by stepping back in time.
    pub stale: Option<Staleness>,
    pub data: Option<JsonValue>,
    /// Timestamp the display data is actually from.
    pub timestamp: Option<DateTime<Utc>>,
    pub history_steps: u32,
}

/// Resolve the displayable state of one instance at `time_of_readout`.
///
/// Steps backward in increments of the instance's polling step until display
/// data turns up, up to [`MAX_HISTORY_STEPS`] attempts. Data found on the
/// first attempt carries the stored status (or info); data found later is
/// forced to warning with a staleness disclosure; exhausting the search is
/// reported as technical-issue with no disclosure, the same as finding
/// nothing at all.
pub async fn render_status(
    unit: &dyn Analysis,
    store: &StatusStore,
    config: &CoreConfig,
    instance: &InstanceConfig,
    time_of_readout: DateTime<Utc>,
) -> InstancePage {
    let dt = instance.step(config);
    let mut readout = time_of_readout;
    let mut history_steps = 0u32;
    let mut found = None;

    while history_steps < MAX_HISTORY_STEPS {
        match unit.retrieve_for_display(instance, readout, dt).await {
            Ok(Some(sample)) => {
                found = Some(sample);
                break;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    analysis = %unit.name(),
                    instance = %instance.name,
                    error = %format!("{err:#}"),
                    "display data retrieval failed"
                );
            }
        }
        readout -= dt;
        history_steps += 1;
    }

    let Some(sample) = found else {
        return InstancePage {
            status: Severity::TechnicalIssue,
            stale: None,
            data: None,
            timestamp: None,
            history_steps,
        };
    };

    let (status, stale) = if history_steps == 0 {
        let status = if instance.is_info {
            Severity::Info
        } else {
            unit.instance_status(store, config, instance, time_of_readout, None)
                .latest()
                .status
        };
        (status, None)
    } else {
        (
            Severity::Warning,
            Some(Staleness::from_lag(dt * history_steps as i32)),
        )
    };

    InstancePage {
        status,
        stale,
        data: Some(sample.payload),
        timestamp: Some(sample.time),
        history_steps,
    }
}
