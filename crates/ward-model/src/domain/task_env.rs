use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{KeyValue, ModelError};

/// Ordered list of environment variables handed to a task.
///
/// Later entries shadow earlier ones with the same key, so layering
/// (runner env, then task env, then hook env) is a plain concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskEnv(pub Vec<KeyValue>);

impl TaskEnv {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Value of the last entry with `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Concatenate `other` after `self`; entries from `other` win on lookup.
    pub fn merged(&self, other: &TaskEnv) -> TaskEnv {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        TaskEnv(out)
    }

    /// Collapse shadowed entries into a sorted key → value map.
    pub fn resolved(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|kv| (kv.key().to_string(), kv.value().to_string()))
            .collect()
    }

    /// Reject keys a process environment cannot carry.
    pub fn validate(&self) -> Result<(), ModelError> {
        for kv in &self.0 {
            if kv.key().is_empty() {
                return Err(ModelError::InvalidTask("empty env key".into()));
            }
            if kv.key().contains('=') || kv.key().contains('\0') {
                return Err(ModelError::InvalidTask(format!(
                    "invalid env key {:?}",
                    kv.key()
                )));
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for TaskEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskEnv;

    #[test]
    fn later_entries_shadow_earlier_ones() {
        let mut env = TaskEnv::new();
        env.push("PORT", "80");
        env.push("HOST", "a");
        env.push("PORT", "8080");

        assert_eq!(env.get("PORT"), Some("8080"));
        assert_eq!(env.get("HOST"), Some("a"));
        assert!(env.get("MISSING").is_none());
        assert_eq!(env.resolved().len(), 2);
    }

    #[test]
    fn merged_layers_override_base() {
        let base: TaskEnv = [("A", "1"), ("B", "2")].into_iter().collect();
        let layer: TaskEnv = [("A", "override"), ("C", "3")].into_iter().collect();

        let merged = base.merged(&layer);
        assert_eq!(merged.get("A"), Some("override"));
        assert_eq!(merged.get("B"), Some("2"));
        assert_eq!(merged.get("C"), Some("3"));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn validate_rejects_bad_keys() {
        let ok: TaskEnv = [("GOOD", "x")].into_iter().collect();
        assert!(ok.validate().is_ok());

        let empty: TaskEnv = [("", "x")].into_iter().collect();
        assert!(empty.validate().is_err());

        let eq: TaskEnv = [("A=B", "x")].into_iter().collect();
        assert!(eq.validate().is_err());
    }

    #[test]
    fn serializes_as_plain_array() {
        let env: TaskEnv = [("FOO", "bar")].into_iter().collect();
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"[{"key":"FOO","value":"bar"}]"#);
    }
}
