use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::{debug, trace};
use ward_core::{StateDb, StateDbError, StateTx, TaskKey};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS task_local_state (
    alloc_id TEXT NOT NULL,
    task     TEXT NOT NULL,
    key      TEXT NOT NULL,
    data     BLOB NOT NULL,
    PRIMARY KEY (alloc_id, task, key)
);
";

/// Upper bound on waiting for another connection's lock; commits run on the
/// caller's thread.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

fn map_err(e: rusqlite::Error) -> StateDbError {
    StateDbError::Backend(e.to_string())
}

/// Task state in a single SQLite file, one row per (alloc, task, key).
#[derive(Clone)]
pub struct SqliteStateDb {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateDbError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(map_err)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(map_err)?;
        // WAL keeps commits atomic without an fsync per transaction
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(map_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_err)?;
        debug!(path = %path.display(), journal_mode = %mode, "opened state db");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StateDbError> {
        Self::init(Connection::open_in_memory().map_err(map_err)?)
    }

    fn init(conn: Connection) -> Result<Self, StateDbError> {
        conn.execute_batch(SCHEMA).map_err(map_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Drop every key stored for `alloc_id`.
    pub fn delete_alloc(&self, alloc_id: &str) -> Result<usize, StateDbError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "DELETE FROM task_local_state WHERE alloc_id = ?1",
            params![alloc_id],
        )
        .map_err(map_err)
    }
}

impl std::fmt::Debug for SqliteStateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SqliteStateDb")
    }
}

struct SqliteTx<'a> {
    tx: &'a Transaction<'a>,
}

impl StateTx for SqliteTx<'_> {
    fn put(&mut self, key: &TaskKey, name: &str, value: &[u8]) -> Result<(), StateDbError> {
        self.tx
            .execute(
                "INSERT INTO task_local_state (alloc_id, task, key, data) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (alloc_id, task, key) DO UPDATE SET data = excluded.data",
                params![key.alloc_id, key.task, name, value],
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn delete(&mut self, key: &TaskKey, name: &str) -> Result<(), StateDbError> {
        self.tx
            .execute(
                "DELETE FROM task_local_state WHERE alloc_id = ?1 AND task = ?2 AND key = ?3",
                params![key.alloc_id, key.task, name],
            )
            .map_err(map_err)?;
        Ok(())
    }
}

impl StateDb for SqliteStateDb {
    fn get(&self, key: &TaskKey, name: &str) -> Result<Option<Vec<u8>>, StateDbError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.query_row(
            "SELECT data FROM task_local_state WHERE alloc_id = ?1 AND task = ?2 AND key = ?3",
            params![key.alloc_id, key.task, name],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(map_err)
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut dyn StateTx) -> Result<(), StateDbError>,
    ) -> Result<(), StateDbError> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction().map_err(map_err)?;
        f(&mut SqliteTx { tx: &tx })?;
        tx.commit().map_err(map_err)?;
        trace!("state db transaction committed");
        Ok(())
    }
}
