//! Session-wide store of normalized entity payloads

use crate::model::EntityKey;
use crate::resolver::nodes::EntityPayload;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Entity store shared between the walker and reply tasks
pub type SharedEntityStore = Arc<Mutex<EntityStore>>;

/// Mapping from entity key to normalized payload
///
/// Accumulates for the whole session. Merging is last-write-wins per key and
/// never removes entries.
#[derive(Debug, Default)]
pub struct EntityStore {
    entries: HashMap<EntityKey, EntityPayload>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedEntityStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Applies a batch update; every incoming key overwrites the stored value
    pub fn merge<I>(&mut self, update: I)
    where
        I: IntoIterator<Item = (EntityKey, EntityPayload)>,
    {
        for (key, payload) in update {
            self.entries.insert(key, payload);
        }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&EntityPayload> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
