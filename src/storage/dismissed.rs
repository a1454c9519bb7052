use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::ItemId;

use super::kv::KeyValueStore;

/// Key under which dismissed identities are persisted.
pub const DISMISSED_KEY: &str = "dismissedStaleComments";

/// Identities the user has dismissed. Loaded once, written through on every change.
pub struct DismissedSet {
    store: Arc<dyn KeyValueStore>,
    ids: RwLock<HashSet<ItemId>>,
}

impl std::fmt::Debug for DismissedSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DismissedSet")
            .field("len", &self.ids.read().len())
            .finish()
    }
}

impl DismissedSet {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let ids: HashSet<ItemId> = store
            .get(DISMISSED_KEY)?
            .unwrap_or_default()
            .into_iter()
            .map(ItemId::from)
            .collect();
        debug!(count = ids.len(), "loaded dismissed identities");
        Ok(Self {
            store,
            ids: RwLock::new(ids),
        })
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.ids.read().contains(id)
    }

    /// Add `id` and persist. Returns `false` if it was already dismissed.
    ///
    /// When persisting fails the in-memory set is left unchanged.
    pub fn insert(&self, id: ItemId) -> Result<bool, StoreError> {
        let mut ids = self.ids.write();
        if ids.contains(&id) {
            return Ok(false);
        }

        let mut values: Vec<String> = ids.iter().map(|i| i.as_str().to_string()).collect();
        values.push(id.as_str().to_string());
        values.sort();
        self.store.set(DISMISSED_KEY, &values)?;

        info!(id = %id, "dismissed stale comment");
        ids.insert(id);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}
