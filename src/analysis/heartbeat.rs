use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};
use std::time::Duration as StdDuration;

use crate::analysis::payloads::PayloadLog;
use crate::analysis::{Analysis, DisplaySample, InstanceConfig, PersistOutcome};
use crate::db::Db;

const FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Informational unit: confirms a source is reachable and keeps the response
/// for display, but never contributes a status to the store. Instances are
/// expected to carry `is_info: true`.
pub struct HeartbeatAnalysis {
    name: String,
    instances: Vec<InstanceConfig>,
    http: reqwest::Client,
    payloads: PayloadLog,
}

impl HeartbeatAnalysis {
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
impl Analysis for HeartbeatAnalysis {
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
        let status = response.status();
        if !status.is_success() {
            return Ok(None);
        }
        // Keep the body when it parses, otherwise just the reachability fact.
        let payload = response
            .json::<JsonValue>()
            .await
            .unwrap_or_else(|_| json!({ "http_status": status.as_u16() }));
        Ok(Some(payload))
    }

    async fn persist(&self, data: JsonValue, instance: &InstanceConfig) -> Result<PersistOutcome> {
        self.payloads.record(&instance.name, Utc::now(), &data)?;
        // No status to record; the resolver reports these instances as info.
        Ok(PersistOutcome {
            status: None,
            time: None,
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
