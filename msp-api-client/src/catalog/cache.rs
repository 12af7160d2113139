//! Bounded LRU memo for rendered introspection results
//!
//! The document behind a catalog never changes once loaded, so entries have
//! no TTL. Only the entry count is bounded.

use super::query::DetailOptions;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Normalized identity of one introspection query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Overview,
    Details {
        pattern: String,
        options: DetailOptions,
    },
    Search {
        terms: Vec<String>,
        limit: usize,
        skip: usize,
    },
    Schemas {
        pattern: Option<String>,
        limit: usize,
        skip: usize,
        list_names: bool,
    },
}

struct CacheStore {
    items: HashMap<QueryKey, Arc<Value>>,
    access_order: Vec<QueryKey>,
    max_size: usize,
}

impl CacheStore {
    fn get(&mut self, key: &QueryKey) -> Option<Arc<Value>> {
        let value = self.items.get(key)?.clone();
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.access_order.push(key.clone());
        Some(value)
    }

    fn insert(&mut self, key: QueryKey, value: Arc<Value>) {
        if let Some(pos) = self.access_order.iter().position(|k| k == &key) {
            self.access_order.remove(pos);
        }
        self.items.remove(&key);
        while self.items.len() >= self.max_size && !self.access_order.is_empty() {
            let lru_key = self.access_order.remove(0);
            trace!("Evicting {:?}", lru_key);
            self.items.remove(&lru_key);
        }
        self.access_order.push(key.clone());
        self.items.insert(key, value);
    }
}

pub struct QueryCache {
    store: Option<Mutex<CacheStore>>,
}

impl QueryCache {
    pub fn new(max_entries: usize) -> Self {
        if max_entries == 0 {
            return Self::disabled();
        }
        Self {
            store: Some(Mutex::new(CacheStore {
                items: HashMap::new(),
                access_order: Vec::new(),
                max_size: max_entries,
            })),
        }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn get(&self, key: &QueryKey) -> Option<Arc<Value>> {
        let store = self.store.as_ref()?;
        let mut store = store.lock().unwrap_or_else(|p| p.into_inner());
        store.get(key)
    }

    pub fn insert(&self, key: QueryKey, value: Arc<Value>) {
        if let Some(store) = self.store.as_ref() {
            let mut store = store.lock().unwrap_or_else(|p| p.into_inner());
            store.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.store.as_ref().map_or(0, |store| {
            store.lock().unwrap_or_else(|p| p.into_inner()).items.len()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
