//! Durable node-local state.
//!
//! [`StateDb`] is the storage boundary: a keyed blob store with
//! all-or-nothing write transactions. [`LocalStateStore`] sits on top and
//! writes a task's [`LocalState`](ward_model::LocalState) only when its content changed.

mod persist;
pub use persist::{LocalStateStore, PersistOutcome};

use std::{collections::BTreeMap, fmt};

use crate::{error::StateDbError, sync::lock};

/// Name under which a task's local state is stored.
pub const LOCAL_STATE_KEY: &str = "local_state";

/// Identifies one task of one allocation in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    pub alloc_id: String,
    pub task: String,
}

impl TaskKey {
    pub fn new(alloc_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            alloc_id: alloc_id.into(),
            task: task.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.alloc_id, self.task)
    }
}

/// Write side of one transaction.
pub trait StateTx {
    fn put(&mut self, key: &TaskKey, name: &str, value: &[u8]) -> Result<(), StateDbError>;
    fn delete(&mut self, key: &TaskKey, name: &str) -> Result<(), StateDbError>;
}

/// Durable task state keyed by [`TaskKey`].
///
/// Calls are synchronous and made inline from the run loop whenever local
/// state actually changed, so implementations must finish promptly and
/// never block on other tasks of the runtime.
pub trait StateDb: Send + Sync {
    fn get(&self, key: &TaskKey, name: &str) -> Result<Option<Vec<u8>>, StateDbError>;

    /// Run `f` inside one transaction. Writes are committed only if `f` and the
    /// commit both succeed; otherwise nothing becomes visible.
    fn update(
        &self,
        f: &mut dyn FnMut(&mut dyn StateTx) -> Result<(), StateDbError>,
    ) -> Result<(), StateDbError>;
}

type Entries = BTreeMap<(TaskKey, String), Vec<u8>>;

/// In-memory [`StateDb`], for tests and agents without a data dir.
#[derive(Debug, Default)]
pub struct MemStateDb {
    inner: std::sync::Mutex<MemInner>,
}

#[derive(Debug, Default)]
struct MemInner {
    entries: Entries,
    commits: u64,
    fail_commits: bool,
}

struct MemTx {
    staged: Vec<((TaskKey, String), Option<Vec<u8>>)>,
}

impl StateTx for MemTx {
    fn put(&mut self, key: &TaskKey, name: &str, value: &[u8]) -> Result<(), StateDbError> {
        self.staged
            .push(((key.clone(), name.to_string()), Some(value.to_vec())));
        Ok(())
    }

    fn delete(&mut self, key: &TaskKey, name: &str) -> Result<(), StateDbError> {
        self.staged.push(((key.clone(), name.to_string()), None));
        Ok(())
    }
}

impl MemStateDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions.
    pub fn commits(&self) -> u64 {
        lock(&self.inner).commits
    }

    /// Make every following commit fail with [`StateDbError::Backend`].
    pub fn set_fail_commits(&self, fail: bool) {
        lock(&self.inner).fail_commits = fail;
    }
}

impl StateDb for MemStateDb {
    fn get(&self, key: &TaskKey, name: &str) -> Result<Option<Vec<u8>>, StateDbError> {
        let inner = lock(&self.inner);
        Ok(inner.entries.get(&(key.clone(), name.to_string())).cloned())
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut dyn StateTx) -> Result<(), StateDbError>,
    ) -> Result<(), StateDbError> {
        let mut tx = MemTx { staged: Vec::new() };
        f(&mut tx)?;

        let mut inner = lock(&self.inner);
        if inner.fail_commits {
            return Err(StateDbError::Backend("commit rejected".into()));
        }
        for (k, v) in tx.staged {
            match v {
                Some(v) => {
                    inner.entries.insert(k, v);
                }
                None => {
                    inner.entries.remove(&k);
                }
            }
        }
        inner.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_closure_commits_nothing() {
        let db = MemStateDb::new();
        let key = TaskKey::new("a", "t");

        let res = db.update(&mut |tx| {
            tx.put(&key, "x", b"1")?;
            Err(StateDbError::Backend("abort".into()))
        });
        assert!(res.is_err());
        assert_eq!(db.get(&key, "x").unwrap(), None);
        assert_eq!(db.commits(), 0);

        db.update(&mut |tx| tx.put(&key, "x", b"2")).unwrap();
        assert_eq!(db.get(&key, "x").unwrap().as_deref(), Some(&b"2"[..]));

        db.update(&mut |tx| tx.delete(&key, "x")).unwrap();
        assert_eq!(db.get(&key, "x").unwrap(), None);
        assert_eq!(db.commits(), 2);
    }

    #[test]
    fn keys_are_scoped_per_task() {
        let db = MemStateDb::new();
        let a = TaskKey::new("alloc", "a");
        let b = TaskKey::new("alloc", "b");

        db.update(&mut |tx| tx.put(&a, LOCAL_STATE_KEY, b"a")).unwrap();
        assert_eq!(db.get(&b, LOCAL_STATE_KEY).unwrap(), None);
        assert_eq!(a.to_string(), "alloc/a");
    }
}
