use std::sync::{Arc, Mutex, RwLock};

use sha2::{Digest, Sha256};
use tracing::{debug, trace};
use ward_model::LocalState;

use super::{LOCAL_STATE_KEY, StateDb, TaskKey};
use crate::{
    error::PersistError,
    sync::{lock, read},
};

pub type StateHash = [u8; 32];

/// Result of a [`LocalStateStore::persist`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The encoding changed and was committed.
    Written,
    /// Same content as the last successful write; nothing was written.
    Unchanged,
}

/// Writes one task's [`LocalState`] through a [`StateDb`], skipping writes
/// whose content hash matches the last committed one.
pub struct LocalStateStore {
    db: Arc<dyn StateDb>,
    key: TaskKey,
    /// Hash of the last committed encoding. Held for the whole persist so
    /// concurrent callers serialize.
    persisted: Mutex<Option<StateHash>>,
}

impl LocalStateStore {
    pub fn new(db: Arc<dyn StateDb>, key: TaskKey) -> Self {
        Self {
            db,
            key,
            persisted: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Deterministic encoding: fixed field order, ordered maps.
    pub fn encode(state: &LocalState) -> Result<Vec<u8>, PersistError> {
        Ok(serde_json::to_vec(state)?)
    }

    pub fn hash(encoded: &[u8]) -> StateHash {
        Sha256::digest(encoded).into()
    }

    /// Hash of the last committed (or loaded) encoding.
    pub fn persisted_hash(&self) -> Option<StateHash> {
        *lock(&self.persisted)
    }

    /// Read the stored state, if any. The stored bytes count as persisted.
    pub fn load(&self) -> Result<Option<LocalState>, PersistError> {
        let mut persisted = lock(&self.persisted);
        let Some(raw) = self.db.get(&self.key, LOCAL_STATE_KEY)? else {
            return Ok(None);
        };
        let state: LocalState = serde_json::from_slice(&raw)?;
        *persisted = Some(Self::hash(&raw));
        debug!(task = %self.key, "loaded local state");
        Ok(Some(state))
    }

    /// Encode `state` under its read lock and write it if it changed.
    ///
    /// The stored hash moves only after the transaction committed, so a
    /// failed write is retried by the next call.
    pub fn persist(&self, state: &RwLock<LocalState>) -> Result<PersistOutcome, PersistError> {
        let mut persisted = lock(&self.persisted);

        let encoded = {
            let state = read(state);
            Self::encode(&state)?
        };
        let hash = Self::hash(&encoded);
        if persisted.as_ref() == Some(&hash) {
            trace!(task = %self.key, "local state unchanged");
            return Ok(PersistOutcome::Unchanged);
        }

        self.db
            .update(&mut |tx| tx.put(&self.key, LOCAL_STATE_KEY, &encoded))?;
        *persisted = Some(hash);
        debug!(task = %self.key, bytes = encoded.len(), "persisted local state");
        Ok(PersistOutcome::Written)
    }
}

impl std::fmt::Debug for LocalStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStateStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemStateDb;

    fn store() -> (Arc<MemStateDb>, LocalStateStore) {
        let db = Arc::new(MemStateDb::new());
        let store = LocalStateStore::new(db.clone(), TaskKey::new("a-1", "web"));
        (db, store)
    }

    fn with_handle(id: &str) -> RwLock<LocalState> {
        RwLock::new(LocalState {
            handle_id: Some(id.into()),
            ..LocalState::default()
        })
    }

    #[test]
    fn unchanged_state_is_written_once() {
        let (db, store) = store();
        let state = with_handle("h-1");

        assert_eq!(store.persist(&state).unwrap(), PersistOutcome::Written);
        assert_eq!(store.persist(&state).unwrap(), PersistOutcome::Unchanged);
        assert_eq!(db.commits(), 1);

        state.write().unwrap().handle_id = Some("h-2".into());
        assert_eq!(store.persist(&state).unwrap(), PersistOutcome::Written);
        assert_eq!(db.commits(), 2);
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut a = LocalState::new();
        a.driver.insert("z".into(), "1".into());
        a.driver.insert("a".into(), "2".into());
        let mut b = LocalState::new();
        b.driver.insert("a".into(), "2".into());
        b.driver.insert("z".into(), "1".into());

        let ea = LocalStateStore::encode(&a).unwrap();
        let eb = LocalStateStore::encode(&b).unwrap();
        assert_eq!(LocalStateStore::hash(&ea), LocalStateStore::hash(&eb));

        let decoded: LocalState = serde_json::from_slice(&ea).unwrap();
        assert_eq!(decoded, a);
        let reencoded = LocalStateStore::encode(&decoded).unwrap();
        assert_eq!(reencoded, ea);
        assert_eq!(LocalStateStore::hash(&reencoded), LocalStateStore::hash(&ea));
    }

    #[test]
    fn failed_write_keeps_previous_hash() {
        let (db, store) = store();
        let state = with_handle("h-1");
        store.persist(&state).unwrap();
        let before = store.persisted_hash();

        db.set_fail_commits(true);
        state.write().unwrap().handle_id = Some("h-2".into());
        assert!(matches!(store.persist(&state), Err(PersistError::Store(_))));
        assert_eq!(store.persisted_hash(), before);

        db.set_fail_commits(false);
        assert_eq!(store.persist(&state).unwrap(), PersistOutcome::Written);
    }

    #[test]
    fn load_primes_the_hash() {
        let (db, first) = store();
        let state = with_handle("h-1");
        first.persist(&state).unwrap();

        let second = LocalStateStore::new(db.clone(), TaskKey::new("a-1", "web"));
        let loaded = second.load().unwrap().unwrap();
        assert_eq!(loaded.handle_id.as_deref(), Some("h-1"));
        assert_eq!(second.persist(&state).unwrap(), PersistOutcome::Unchanged);
        assert_eq!(db.commits(), 1);
    }
}
