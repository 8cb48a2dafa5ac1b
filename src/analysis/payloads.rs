use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value as JsonValue;

use crate::analysis::DisplaySample;
use crate::db::Db;

/// Keyed log of raw fetched payloads, shared by the bundled analysis units.
/// One row per `(instance, time)`; re-fetching the same moment overwrites.
#[derive(Clone)]
pub struct PayloadLog {
    db: Db,
}

impl PayloadLog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn record(&self, instance: &str, time: DateTime<Utc>, payload: &JsonValue) -> Result<()> {
        let serialized = serde_json::to_string(payload)?;
        self.db
            .with(|conn| {
                conn.execute(
                    r#"
                    INSERT INTO analysis_payloads (instance, time_ms, payload)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT (instance, time_ms)
                    DO UPDATE SET payload = excluded.payload
                    "#,
                    params![instance, time.timestamp_millis(), serialized],
                )?;
                Ok(())
            })
            .with_context(|| format!("failed to record payload for instance {instance}"))
    }

    /// Most recent payload with `reference - window < time <= reference`.
    pub fn latest_within(
        &self,
        instance: &str,
        reference: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<DisplaySample>> {
        let from_ms = (reference - window).timestamp_millis();
        let to_ms = reference.timestamp_millis();
        let row: Option<(i64, String)> = self.db.with(|conn| {
            conn.query_row(
                r#"
                SELECT time_ms, payload
                FROM analysis_payloads
                WHERE instance = ?1
                  AND time_ms > ?2
                  AND time_ms <= ?3
                ORDER BY time_ms DESC
                LIMIT 1
                "#,
                params![instance, from_ms, to_ms],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })?;

        let Some((time_ms, serialized)) = row else {
            return Ok(None);
        };
        let payload: JsonValue = serde_json::from_str(&serialized)
            .with_context(|| format!("corrupt payload row for instance {instance}"))?;
        Ok(Some(DisplaySample {
            payload,
            time: Utc
                .timestamp_millis_opt(time_ms)
                .single()
                .unwrap_or(reference),
        }))
    }
}
