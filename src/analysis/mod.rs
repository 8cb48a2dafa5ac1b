use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

use crate::config::CoreConfig;
use crate::db::Db;
use crate::services::resolver;
use crate::status::StatusSeries;
use crate::store::StatusStore;

pub mod heartbeat;
pub mod http_json;
pub mod payloads;

pub use heartbeat::HeartbeatAnalysis;
pub use http_json::HttpJsonAnalysis;

/// Raised while building the registry. A unit with an invalid instance config
/// never becomes active.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("analysis {analysis} instance {instance}: the source field is required")]
    MissingSource { analysis: String, instance: String },
    #[error("duplicate analysis name {name}")]
    DuplicateAnalysis { name: String },
}

/// What a unit's persist step reports back to the dispatcher. `status: None`
/// means there is nothing to record in the status store (valid for `is_info`
/// instances).
#[derive(Debug, Clone, Copy)]
pub struct PersistOutcome {
    pub status: Option<crate::status::Severity>,
    pub time: Option<DateTime<Utc>>,
}

/// Display data returned by a unit's read path, together with the timestamp
/// the data is actually from (which may differ from the requested time).
#[derive(Debug, Clone)]
pub struct DisplaySample {
    pub payload: JsonValue,
    pub time: DateTime<Utc>,
}

/// A pluggable source of monitored data, owning one or more instances.
///
/// The core only orchestrates across units: it never interprets the fetched
/// payloads, it just drives fetch/persist on the write path and
/// retrieve_for_display/instance_status on the read path.
#[async_trait]
pub trait Analysis: Send + Sync {
    fn name(&self) -> &str;

    fn instances(&self) -> &[InstanceConfig];

    /// Pull raw data from the instance's source. `Ok(None)` means the source
    /// answered but had nothing usable; the dispatcher records a technical
    /// issue for it.
    async fn fetch(&self, instance: &InstanceConfig) -> Result<Option<JsonValue>>;

    /// Reduce fetched data to a status and keep whatever the unit needs for
    /// its display read path.
    async fn persist(&self, data: JsonValue, instance: &InstanceConfig) -> Result<PersistOutcome>;

    /// Load display data for `(reference - window, reference]`.
    async fn retrieve_for_display(
        &self,
        instance: &InstanceConfig,
        reference: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<DisplaySample>>;

    /// Status series for one instance at a point in time. Units can override
    /// this when their status lives somewhere other than the status store.
    fn instance_status(
        &self,
        store: &StatusStore,
        config: &CoreConfig,
        instance: &InstanceConfig,
        reference: DateTime<Utc>,
        window: Option<Duration>,
    ) -> StatusSeries {
        resolver::resolve(store, config, instance, reference, window)
    }
}

/// Static configuration of one monitored instance, immutable after the
/// defaulting pass.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub name: String,
    pub verbose_name: String,
    pub category: String,
    pub sources: Vec<String>,
    pub description: String,
    pub is_info: bool,
    pub pull_multiplier: u32,
    pub warning_threshold: Option<f64>,
    pub critical_threshold: Option<f64>,
    /// Display position within the category; negative means unordered and
    /// sorts after all ordered instances.
    pub order: i64,
    /// JSON pointer to the observed value inside fetched payloads.
    pub value_pointer: Option<String>,
}

impl InstanceConfig {
    /// Effective polling step for this instance.
    pub fn step(&self, config: &CoreConfig) -> Duration {
        config.pull_interval() * self.pull_multiplier.max(1) as i32
    }
}

#[derive(Debug, Deserialize)]
struct AnalysesFile {
    analyses: Vec<UnitSpec>,
}

#[derive(Debug, Deserialize)]
struct UnitSpec {
    name: String,
    kind: UnitKind,
    #[serde(default)]
    instances: Vec<RawInstance>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum UnitKind {
    HttpJson,
    Heartbeat,
}

#[derive(Debug, Default, Deserialize)]
struct RawInstance {
    name: Option<String>,
    verbose_name: Option<String>,
    category: Option<String>,
    source: Option<SourceList>,
    description: Option<String>,
    #[serde(default)]
    is_info: bool,
    pull_multiplier: Option<u32>,
    warning_threshold: Option<f64>,
    critical_threshold: Option<f64>,
    order: Option<i64>,
    value_pointer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceList {
    One(String),
    Many(Vec<String>),
}

impl SourceList {
    fn into_vec(self) -> Vec<String> {
        match self {
            SourceList::One(source) => vec![source],
            SourceList::Many(sources) => sources,
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The defaulting pass: back-fill everything optional, normalize names, and
/// reject instances without a source.
fn normalize_instance(
    analysis_name: &str,
    index: usize,
    raw: RawInstance,
) -> Result<InstanceConfig, ConfigError> {
    let name = match raw.name {
        Some(name) if !name.trim().is_empty() => normalize_name(&name),
        _ => format!("{analysis_name}_{index}"),
    };
    let verbose_name = raw
        .verbose_name
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| capitalize(&name.replace('_', " ")));
    let category = raw
        .category
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "Uncategorized".to_string());
    let sources = raw
        .source
        .map(SourceList::into_vec)
        .filter(|sources| !sources.is_empty())
        .ok_or_else(|| ConfigError::MissingSource {
            analysis: analysis_name.to_string(),
            instance: name.clone(),
        })?;
    let description = raw.description.unwrap_or_else(|| {
        tracing::warn!(
            analysis = %analysis_name,
            instance = %name,
            "instance has no description"
        );
        "There is no description available yet.".to_string()
    });

    Ok(InstanceConfig {
        name,
        verbose_name,
        category,
        sources,
        description,
        is_info: raw.is_info,
        pull_multiplier: raw.pull_multiplier.unwrap_or(1).max(1),
        warning_threshold: raw.warning_threshold,
        critical_threshold: raw.critical_threshold,
        order: raw.order.unwrap_or(-1),
        value_pointer: raw.value_pointer,
    })
}

/// The set of active analysis units, built once at process start.
#[derive(Clone)]
pub struct Registry {
    units: Vec<Arc<dyn Analysis>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("units", &self.units.iter().map(|u| u.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn load(config: &CoreConfig, db: Db, http: reqwest::Client) -> Result<Self> {
        let contents = std::fs::read_to_string(&config.analyses_path).with_context(|| {
            format!(
                "failed to read analyses config {}",
                config.analyses_path.display()
            )
        })?;
        let file: AnalysesFile = serde_json::from_str(&contents).with_context(|| {
            format!(
                "failed to parse analyses config {}",
                config.analyses_path.display()
            )
        })?;
        Self::from_specs(file.analyses, db, http)
    }

    fn from_specs(specs: Vec<UnitSpec>, db: Db, http: reqwest::Client) -> Result<Self> {
        let mut units: Vec<Arc<dyn Analysis>> = Vec::new();
        for spec in specs {
            let name = normalize_name(&spec.name);
            if units.iter().any(|unit| unit.name() == name) {
                return Err(ConfigError::DuplicateAnalysis { name }.into());
            }
            let mut instances = Vec::new();
            for (index, raw) in spec.instances.into_iter().enumerate() {
                instances.push(normalize_instance(&name, index, raw)?);
            }
            let unit: Arc<dyn Analysis> = match spec.kind {
                UnitKind::HttpJson => Arc::new(HttpJsonAnalysis::new(
                    name,
                    instances,
                    http.clone(),
                    db.clone(),
                )),
                UnitKind::Heartbeat => Arc::new(HeartbeatAnalysis::new(
                    name,
                    instances,
                    http.clone(),
                    db.clone(),
                )),
            };
            units.push(unit);
        }
        Ok(Self { units })
    }

    pub fn units(&self) -> &[Arc<dyn Analysis>] {
        &self.units
    }

    pub fn names(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.name().to_string()).collect()
    }

    /// Resolve a CLI selection. An empty selection or the `all` sentinel
    /// means every registered unit; unknown names are a usage error.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn Analysis>>> {
        if names.is_empty() || names.iter().any(|name| name == "all") {
            return Ok(self.units.clone());
        }
        let mut selected = Vec::new();
        for name in names {
            let unit = self
                .units
                .iter()
                .find(|unit| unit.name() == name.as_str())
                .with_context(|| {
                    format!(
                        "unknown analysis {name}; known analyses: {}",
                        self.names().join(", ")
                    )
                })?;
            selected.push(unit.clone());
        }
        Ok(selected)
    }
}
