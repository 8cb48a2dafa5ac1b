use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Shared handle to the embedded SQLite database. Writes are short keyed
/// upserts, so a single connection behind a mutex is sufficient for the
/// per-unit dispatch tasks.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_schema(&conn).context("failed to initialize database schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let guard = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(f(&guard)?)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS instances (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        -- One row per (time, instance, category); same-key writes overwrite
        -- the status in place. Times are Unix milliseconds.
        CREATE TABLE IF NOT EXISTS instance_status (
            id INTEGER PRIMARY KEY,
            time_ms INTEGER NOT NULL,
            instance_id INTEGER NOT NULL REFERENCES instances(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            status INTEGER NOT NULL,
            UNIQUE (time_ms, instance_id, category_id)
        );

        CREATE INDEX IF NOT EXISTS idx_instance_status_lookup
            ON instance_status (instance_id, category_id, time_ms);

        -- Raw fetched payloads kept by the bundled analysis units for the
        -- display read path.
        CREATE TABLE IF NOT EXISTS analysis_payloads (
            id INTEGER PRIMARY KEY,
            instance TEXT NOT NULL,
            time_ms INTEGER NOT NULL,
            payload TEXT NOT NULL,
            UNIQUE (instance, time_ms)
        );
        "#,
    )
}
