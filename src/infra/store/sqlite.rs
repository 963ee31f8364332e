//! SQLite resource store.
//!
//! Counts live in `resource`, queue rows in `queue_entry` with the request
//! variant encoded as JSON. Row order is insertion order by `id`.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{QueueEntry, QueuedRequest, ResourceStore, SimulationError};
use crate::util::serde::{CallbackRef, QueueName, ResourceKind};

const MIGRATION: &str = include_str!("../../../migrations/001_resource_store.sql");

/// Store persisting counts and queue rows in SQLite.
pub struct SqliteResourceStore {
    conn: Mutex<Connection>,
}

struct RawRow {
    patient_id: String,
    callback: String,
    accumulated_wait: f64,
    request: String,
}

impl RawRow {
    fn decode(self) -> Result<QueueEntry, SimulationError> {
        let request: QueuedRequest = serde_json::from_str(&self.request)?;
        Ok(QueueEntry {
            patient_id: self.patient_id,
            callback: CallbackRef(self.callback),
            accumulated_wait: self.accumulated_wait,
            request,
        })
    }
}

const SELECT_ROWS: &str = "SELECT patient_id, callback, accumulated_wait, request
     FROM queue_entry WHERE queue = ?1 ORDER BY id ASC";

fn read_rows(conn: &Connection, queue: QueueName) -> Result<Vec<QueueEntry>, SimulationError> {
    let mut stmt = conn.prepare(SELECT_ROWS)?;
    let raw = stmt
        .query_map(params![queue.as_str()], |row| {
            Ok(RawRow {
                patient_id: row.get(0)?,
                callback: row.get(1)?,
                accumulated_wait: row.get(2)?,
                request: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(RawRow::decode).collect()
}

fn insert_row(conn: &Connection, queue: QueueName, entry: &QueueEntry) -> Result<(), SimulationError> {
    let request = serde_json::to_string(&entry.request)?;
    conn.execute(
        "INSERT INTO queue_entry (queue, patient_id, callback, accumulated_wait, request)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            queue.as_str(),
            entry.patient_id,
            entry.callback.as_str(),
            entry.accumulated_wait,
            request,
        ],
    )?;
    Ok(())
}

impl SqliteResourceStore {
    /// Open (or create) a database file and apply the schema.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Store`] when the file cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Store`] when the schema cannot be applied.
    pub fn in_memory() -> Result<Self, SimulationError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SimulationError> {
        conn.execute_batch(MIGRATION)?;
        tracing::debug!("sqlite resource store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ResourceStore for SqliteResourceStore {
    fn resource_count(&self, kind: ResourceKind) -> Result<u32, SimulationError> {
        let conn = self.conn.lock();
        let count: Option<u32> = conn
            .query_row(
                "SELECT available FROM resource WHERE name = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        count.ok_or_else(|| SimulationError::Store(format!("resource {kind} not initialised")))
    }

    fn set_resource_count(&self, kind: ResourceKind, count: u32) -> Result<(), SimulationError> {
        self.conn.lock().execute(
            "INSERT INTO resource (name, available) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET available = excluded.available",
            params![kind.as_str(), count],
        )?;
        Ok(())
    }

    fn enqueue(&self, queue: QueueName, entry: QueueEntry) -> Result<(), SimulationError> {
        insert_row(&self.conn.lock(), queue, &entry)
    }

    fn peek_all(&self, queue: QueueName) -> Result<Vec<QueueEntry>, SimulationError> {
        read_rows(&self.conn.lock(), queue)
    }

    fn replace_all(&self, queue: QueueName, rows: Vec<QueueEntry>) -> Result<(), SimulationError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM queue_entry WHERE queue = ?1",
            params![queue.as_str()],
        )?;
        for row in &rows {
            insert_row(&tx, queue, row)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove_by_callback_ref(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
    ) -> Result<Option<QueueEntry>, SimulationError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let first = tx
            .query_row(
                "SELECT patient_id, callback, accumulated_wait, request
                 FROM queue_entry WHERE queue = ?1 AND callback = ?2
                 ORDER BY id ASC LIMIT 1",
                params![queue.as_str(), callback.as_str()],
                |row| {
                    Ok(RawRow {
                        patient_id: row.get(0)?,
                        callback: row.get(1)?,
                        accumulated_wait: row.get(2)?,
                        request: row.get(3)?,
                    })
                },
            )
            .optional()?;
        tx.execute(
            "DELETE FROM queue_entry WHERE queue = ?1 AND callback = ?2",
            params![queue.as_str(), callback.as_str()],
        )?;
        tx.commit()?;
        first.map(RawRow::decode).transpose()
    }

    fn update_wait(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
        new_wait: f64,
    ) -> Result<(), SimulationError> {
        self.conn.lock().execute(
            "UPDATE queue_entry SET accumulated_wait = ?1 WHERE queue = ?2 AND callback = ?3",
            params![new_wait, queue.as_str(), callback.as_str()],
        )?;
        Ok(())
    }
}
