use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Node-local task metadata that must survive an agent restart.
///
/// The runner only understands `handle_id`; everything under `driver` is
/// opaque to it. Maps are ordered so the encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    /// Identifier of the live driver handle, used to reattach after a restart.
    #[serde(default)]
    pub handle_id: Option<String>,
    /// Driver-private key/value state.
    #[serde(default)]
    pub driver: BTreeMap<String, String>,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.handle_id.is_none() && self.driver.is_empty()
    }
}
