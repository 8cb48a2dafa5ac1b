use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Db;
use crate::status::{Severity, StatusRecord};

/// Append-mostly log of `(time, instance, category, status)` tuples with
/// windowed range queries. Instance and category rows are upserted by name on
/// first reference and never deleted.
#[derive(Clone)]
pub struct StatusStore {
    db: Db,
}

impl StatusStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent on the exact `(time, instance, category)` triple: a second
    /// write with the same key overwrites the stored status instead of
    /// appending a duplicate row.
    pub fn upsert(
        &self,
        time: DateTime<Utc>,
        instance: &str,
        category: &str,
        status: Severity,
    ) -> Result<()> {
        self.db
            .with(|conn| {
                let instance_id = get_or_create(conn, "instances", instance)?;
                let category_id = get_or_create(conn, "categories", category)?;
                conn.execute(
                    r#"
                    INSERT INTO instance_status (time_ms, instance_id, category_id, status)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (time_ms, instance_id, category_id)
                    DO UPDATE SET status = excluded.status
                    "#,
                    params![time.timestamp_millis(), instance_id, category_id, status.code()],
                )?;
                Ok(())
            })
            .with_context(|| format!("failed to upsert status for instance {instance}"))
    }

    /// All records with `time > reference - window - 1min` and
    /// `time <= reference`, ascending. The extra minute keeps records written
    /// exactly on the window edge from falling out under clock skew. Unknown
    /// instance or category names yield an empty result, not an error.
    pub fn query(
        &self,
        instance: &str,
        category: &str,
        reference: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<StatusRecord>> {
        let window = window + Duration::minutes(1);
        let from_ms = (reference - window).timestamp_millis();
        let to_ms = reference.timestamp_millis();

        self.db
            .with(|conn| {
                let instance_id: Option<i64> = lookup(conn, "instances", instance)?;
                let category_id: Option<i64> = lookup(conn, "categories", category)?;
                let (Some(instance_id), Some(category_id)) = (instance_id, category_id) else {
                    return Ok(Vec::new());
                };

                let mut stmt = conn.prepare(
                    r#"
                    SELECT time_ms, status
                    FROM instance_status
                    WHERE instance_id = ?1
                      AND category_id = ?2
                      AND time_ms > ?3
                      AND time_ms <= ?4
                    ORDER BY time_ms ASC
                    "#,
                )?;
                let rows = stmt.query_map(
                    params![instance_id, category_id, from_ms, to_ms],
                    |row| {
                        let time_ms: i64 = row.get(0)?;
                        let code: i64 = row.get(1)?;
                        Ok((time_ms, code))
                    },
                )?;

                let mut records = Vec::new();
                for row in rows {
                    let (time_ms, code) = row?;
                    let Some(status) = Severity::from_code(code) else {
                        continue;
                    };
                    records.push(StatusRecord {
                        time: Utc.timestamp_millis_opt(time_ms).single().unwrap_or(reference),
                        instance: instance.to_string(),
                        category: category.to_string(),
                        status,
                    });
                }
                Ok(records)
            })
            .with_context(|| format!("failed to query status for instance {instance}"))
    }
}

fn get_or_create(conn: &Connection, table: &str, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        &format!("INSERT OR IGNORE INTO {table} (name) VALUES (?1)"),
        params![name],
    )?;
    conn.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?1"),
        params![name],
        |row| row.get(0),
    )
}

fn lookup(conn: &Connection, table: &str, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?1"),
        params![name],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> StatusStore {
        StatusStore::new(Db::open_in_memory().expect("in-memory db"))
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, h, m, 0).unwrap()
    }

    #[test]
    fn round_trips_a_written_status() -> Result<()> {
        let store = store();
        let t = at(10, 0);
        store.upsert(t, "batch_1", "Batch System", Severity::Warning)?;

        let records = store.query("batch_1", "Batch System", t, Duration::minutes(15))?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, t);
        assert_eq!(records[0].status, Severity::Warning);
        assert_eq!(records[0].instance, "batch_1");
        assert_eq!(records[0].category, "Batch System");
        Ok(())
    }

    #[test]
    fn same_key_upsert_overwrites_instead_of_appending() -> Result<()> {
        let store = store();
        let t = at(10, 0);
        store.upsert(t, "batch_1", "Batch System", Severity::Ok)?;
        store.upsert(t, "batch_1", "Batch System", Severity::Critical)?;

        let records = store.query("batch_1", "Batch System", t, Duration::minutes(15))?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Severity::Critical);
        Ok(())
    }

    #[test]
    fn unknown_instance_or_category_is_empty_not_error() -> Result<()> {
        let store = store();
        store.upsert(at(10, 0), "known", "Batch System", Severity::Ok)?;

        assert!(store
            .query("missing", "Batch System", at(10, 0), Duration::minutes(15))?
            .is_empty());
        assert!(store
            .query("known", "Missing Category", at(10, 0), Duration::minutes(15))?
            .is_empty());
        Ok(())
    }

    #[test]
    fn window_is_buffered_by_one_minute() -> Result<()> {
        let store = store();
        // Exactly on the raw window edge: reference - window.
        store.upsert(at(9, 45), "batch_1", "Batch", Severity::Ok)?;
        let records = store.query("batch_1", "Batch", at(10, 0), Duration::minutes(15))?;
        assert_eq!(records.len(), 1);

        // Beyond the buffered edge.
        let records = store.query("batch_1", "Batch", at(10, 2), Duration::minutes(15))?;
        assert!(records.is_empty());
        Ok(())
    }

    #[test]
    fn future_records_are_excluded() -> Result<()> {
        let store = store();
        store.upsert(at(10, 30), "batch_1", "Batch", Severity::Critical)?;
        let records = store.query("batch_1", "Batch", at(10, 0), Duration::minutes(15))?;
        assert!(records.is_empty());
        Ok(())
    }

    #[test]
    fn records_come_back_ascending_by_time() -> Result<()> {
        let store = store();
        store.upsert(at(10, 15), "batch_1", "Batch", Severity::Warning)?;
        store.upsert(at(10, 0), "batch_1", "Batch", Severity::Ok)?;

        let records = store.query("batch_1", "Batch", at(10, 20), Duration::minutes(30))?;
        assert_eq!(records.len(), 2);
        assert!(records[0].time < records[1].time);
        Ok(())
    }
}
