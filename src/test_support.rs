//! Shared fixtures for the in-file test modules.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::analysis::{Analysis, DisplaySample, InstanceConfig, PersistOutcome};
use crate::config::CoreConfig;
use crate::db::Db;
use crate::status::Severity;
use crate::store::StatusStore;

pub fn test_config() -> CoreConfig {
    CoreConfig {
        pull_interval_minutes: 15,
        sleep_interval_seconds: 60,
        overview_range_hours: 24,
        healthcheck_ping_url: None,
        database_path: PathBuf::from(":memory:"),
        analyses_path: PathBuf::from("analyses.json"),
        debug_mode: true,
    }
}

pub fn test_store() -> StatusStore {
    StatusStore::new(Db::open_in_memory().expect("in-memory db"))
}

/// A fully-defaulted instance; tests tweak the fields they care about.
pub fn instance(name: &str, category: &str) -> InstanceConfig {
    InstanceConfig {
        name: name.to_string(),
        verbose_name: name.to_string(),
        category: category.to_string(),
        sources: vec![format!("https://example.invalid/{name}")],
        description: "test instance".to_string(),
        is_info: false,
        pull_multiplier: 1,
        warning_threshold: None,
        critical_threshold: None,
        order: -1,
        value_pointer: None,
    }
}

enum FetchScript {
    Payload(JsonValue),
    Fail(String),
}

enum PersistScript {
    Status(Severity, Option<DateTime<Utc>>),
    Fail(String),
}

/// An [`Analysis`] whose behavior is fixed per instance up front, so tests
/// can exercise the orchestration paths without any network or parsing.
pub struct ScriptedAnalysis {
    name: String,
    instances: Vec<InstanceConfig>,
    fetches: HashMap<String, FetchScript>,
    persists: HashMap<String, PersistScript>,
    samples: Vec<(String, DateTime<Utc>, JsonValue)>,
}

impl ScriptedAnalysis {
    pub fn new(name: &str, instances: Vec<InstanceConfig>) -> Self {
        Self {
            name: name.to_string(),
            instances,
            fetches: HashMap::new(),
            persists: HashMap::new(),
            samples: Vec::new(),
        }
    }

    pub fn with_fetch_payload(mut self, instance: &str, payload: JsonValue) -> Self {
        self.fetches
            .insert(instance.to_string(), FetchScript::Payload(payload));
        self
    }

    pub fn with_fetch_error(mut self, instance: &str, message: &str) -> Self {
        self.fetches
            .insert(instance.to_string(), FetchScript::Fail(message.to_string()));
        self
    }

    pub fn with_persist_status(mut self, instance: &str, status: Severity) -> Self {
        self.persists
            .insert(instance.to_string(), PersistScript::Status(status, None));
        self
    }

    pub fn with_persist_status_at(
        mut self,
        instance: &str,
        status: Severity,
        time: DateTime<Utc>,
    ) -> Self {
        self.persists.insert(
            instance.to_string(),
            PersistScript::Status(status, Some(time)),
        );
        self
    }

    pub fn with_persist_error(mut self, instance: &str, message: &str) -> Self {
        self.persists
            .insert(instance.to_string(), PersistScript::Fail(message.to_string()));
        self
    }

    pub fn with_display_sample(
        mut self,
        instance: &str,
        time: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        self.samples.push((instance.to_string(), time, payload));
        self
    }
}

#[async_trait]
impl Analysis for ScriptedAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn instances(&self) -> &[InstanceConfig] {
        &self.instances
    }

    async fn fetch(&self, instance: &InstanceConfig) -> Result<Option<JsonValue>> {
        match self.fetches.get(&instance.name) {
            Some(FetchScript::Payload(payload)) => Ok(Some(payload.clone())),
            Some(FetchScript::Fail(message)) => Err(anyhow!("{message}")),
            // Unscripted instances answer but have nothing usable.
            None => Ok(None),
        }
    }

    async fn persist(&self, _data: JsonValue, instance: &InstanceConfig) -> Result<PersistOutcome> {
        match self.persists.get(&instance.name) {
            Some(PersistScript::Status(status, time)) => Ok(PersistOutcome {
                status: Some(*status),
                time: *time,
            }),
            Some(PersistScript::Fail(message)) => Err(anyhow!("{message}")),
            None => Ok(PersistOutcome {
                status: None,
                time: None,
            }),
        }
    }

    async fn retrieve_for_display(
        &self,
        instance: &InstanceConfig,
        reference: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<DisplaySample>> {
        let from = reference - window;
        Ok(self
            .samples
            .iter()
            .filter(|(name, time, _)| {
                name == &instance.name && *time > from && *time <= reference
            })
            .max_by_key(|(_, time, _)| *time)
            .map(|(_, time, payload)| DisplaySample {
                payload: payload.clone(),
                time: *time,
            }))
    }
}
