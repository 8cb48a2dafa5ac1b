use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use std::time::Duration as StdDuration;

use crate::analysis::payloads::PayloadLog;
use crate::analysis::{Analysis, DisplaySample, InstanceConfig, PersistOutcome};
use crate::db::Db;
use crate::status::Severity;

const FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);
const DEFAULT_VALUE_POINTER: &str = "/value";

/// Analysis unit that polls a JSON endpoint, extracts one numeric value via a
/// JSON pointer, and maps it against the instance's warning/critical
/// thresholds.
pub struct HttpJsonAnalysis {
    name: String,
    instances: Vec<InstanceConfig>,
    http: reqwest::Client,
    payloads: PayloadLog,
}

impl HttpJsonAnalysis {
    pub fn new(name: String, instances: Vec<InstanceConfig>, http: reqwest::Client, db: Db) -> Self {
        Self {
            name,
            instances,
            http,
            payloads: PayloadLog::new(db),
        }
    }
}

#[async_trait]
impl Analysis for HttpJsonAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn instances(&self) -> &[InstanceConfig] {
        &self.instances
    }

    async fn fetch(&self, instance: &InstanceConfig) -> Result<Option<JsonValue>> {
        let source = instance
            .sources
            .first()
            .context("instance has no source")?;
        let response = self
            .http
            .get(source)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("request to {source} failed"))?;
        if !response.status().is_success() {
            tracing::warn!(
                instance = %instance.name,
                source = %source,
                status = %response.status(),
                "source answered with a non-success status"
            );
            return Ok(None);
        }
        let payload: JsonValue = response
            .json()
            .await
            .with_context(|| format!("response from {source} is not valid JSON"))?;
        Ok(Some(payload))
    }

    async fn persist(&self, data: JsonValue, instance: &InstanceConfig) -> Result<PersistOutcome> {
        let pointer = instance
            .value_pointer
            .as_deref()
            .unwrap_or(DEFAULT_VALUE_POINTER);
        let value = extract_number(&data, pointer).with_context(|| {
            format!(
                "payload for instance {} has no numeric value at {pointer}",
                instance.name
            )
        })?;
        let time = payload_timestamp(&data).unwrap_or_else(Utc::now);
        self.payloads.record(&instance.name, time, &data)?;

        let status = grade(value, instance);
        Ok(PersistOutcome {
            status: Some(status),
            time: Some(time),
        })
    }

    async fn retrieve_for_display(
        &self,
        instance: &InstanceConfig,
        reference: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<DisplaySample>> {
        self.payloads.latest_within(&instance.name, reference, window)
    }
}

fn extract_number(payload: &JsonValue, pointer: &str) -> Option<f64> {
    match payload.pointer(pointer)? {
        JsonValue::Number(num) => num.as_f64(),
        JsonValue::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Sources may timestamp their own readings; fall back to fetch time when
/// they don't.
fn payload_timestamp(payload: &JsonValue) -> Option<DateTime<Utc>> {
    payload
        .get("timestamp")
        .and_then(|value| value.as_str())
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn grade(value: f64, instance: &InstanceConfig) -> Severity {
    if let Some(critical) = instance.critical_threshold {
        if value >= critical {
            return Severity::Critical;
        }
    }
    if let Some(warning) = instance.warning_threshold {
        if value >= warning {
            return Severity::Warning;
        }
    }
    Severity::Ok
}
