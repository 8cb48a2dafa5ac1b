use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::analysis::Analysis;
use crate::config::CoreConfig;
use crate::status::{Severity, StatusRecord, StatusSeries};
use crate::store::StatusStore;

/// One instance's resolved status plus what the navigation needs to show it.
#[derive(Debug, Clone)]
pub struct InstanceNav {
    pub name: String,
    pub verbose_name: String,
    pub series: StatusSeries,
    pub order: i64,
}

impl InstanceNav {
    pub fn latest_status(&self) -> Severity {
        self.series.latest().status
    }
}

/// A point of the synchronized category time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedStatus {
    pub time: DateTime<Utc>,
    pub status: Severity,
}

/// All instances of one category, in display order.
#[derive(Debug, Clone)]
pub struct CategoryNav {
    pub name: String,
    pub instances: Vec<InstanceNav>,
}

impl CategoryNav {
    /// Worst latest status across the category's instances.
    pub fn latest_status(&self) -> Severity {
        self.instances
            .iter()
            .map(InstanceNav::latest_status)
            .max()
            .unwrap_or(Severity::Ok)
    }

    /// Category severity over time, aligned across instances that are
    /// sampled at different rates.
    ///
    /// The instance with the most records is the time backbone (first one
    /// wins ties). At every backbone timestamp each other instance
    /// contributes the record nearest in absolute time (first match on
    /// ties); synthetic series contribute their single status everywhere.
    /// The category severity at a timestamp is the worst aligned severity.
    pub fn statuses_over_time(&self) -> Vec<TimedStatus> {
        let Some(mut backbone) = self.instances.first() else {
            return Vec::new();
        };
        for candidate in &self.instances[1..] {
            if candidate.series.len() > backbone.series.len() {
                backbone = candidate;
            }
        }

        backbone
            .series
            .records()
            .iter()
            .map(|timepoint| {
                let status = self
                    .instances
                    .iter()
                    .map(|inst| {
                        if inst.series.is_synthetic() {
                            inst.series.latest().status
                        } else {
                            nearest_record(inst.series.records(), timepoint.time).status
                        }
                    })
                    .max()
                    .unwrap_or(Severity::Ok);
                TimedStatus {
                    time: timepoint.time,
                    status,
                }
            })
            .collect()
    }
}

fn nearest_record(records: &[StatusRecord], reference: DateTime<Utc>) -> &StatusRecord {
    debug_assert!(!records.is_empty());
    let mut best = &records[0];
    let mut best_diff = diff_abs(best.time, reference);
    for record in &records[1..] {
        let diff = diff_abs(record.time, reference);
        if diff < best_diff {
            best = record;
            best_diff = diff;
        }
    }
    best
}

fn diff_abs(a: DateTime<Utc>, b: DateTime<Utc>) -> chrono::Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

/// Resolve every registered instance at `reference` and group the results
/// into per-category navigation entries.
///
/// Categories come back sorted alphabetically (case-insensitive); instances
/// within a category follow their explicit order index, with unordered ones
/// (`order < 0`) after all ordered ones, ties kept in registration order.
pub fn collect_category_navs(
    units: &[Arc<dyn Analysis>],
    store: &StatusStore,
    config: &CoreConfig,
    reference: DateTime<Utc>,
    window: Duration,
) -> Vec<CategoryNav> {
    let mut categories: Vec<CategoryNav> = Vec::new();

    for unit in units {
        for instance in unit.instances() {
            let series = unit.instance_status(store, config, instance, reference, Some(window));
            let nav = InstanceNav {
                name: instance.name.clone(),
                verbose_name: instance.verbose_name.clone(),
                series,
                order: instance.order,
            };
            match categories
                .iter_mut()
                .find(|category| category.name == instance.category)
            {
                Some(category) => category.instances.push(nav),
                None => categories.push(CategoryNav {
                    name: instance.category.clone(),
                    instances: vec![nav],
                }),
            }
        }
    }

    categories.sort_by_key(|category| category.name.to_lowercase());
    for category in &mut categories {
        category
            .instances
            .sort_by_key(|inst| if inst.order < 0 { i64::MAX } else { inst.order });
    }
    categories
}

/// Worst category status across the whole system. An empty deployment is
/// healthy by definition.
pub fn global_status(categories: &[CategoryNav]) -> Severity {
    categories
        .iter()
        .map(CategoryNav::latest_status)
        .max()
        .unwrap_or(Severity::Ok)
}
