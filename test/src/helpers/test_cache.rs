use std::{cell::RefCell, collections::HashMap, rc::Rc};

use replicant_client::{CacheEntry, CacheService};

/// In-memory cache. Clones share the same store.
#[derive(Clone, Default)]
pub struct TestCache {
    entries: Rc<RefCell<HashMap<String, CacheEntry>>>,
}

impl TestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheService for TestCache {
    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.get(key)
    }

    fn store(&mut self, key: &str, etag: &str, content: &str) -> bool {
        self.entries.borrow_mut().insert(
            key.to_string(),
            CacheEntry {
                etag: etag.to_string(),
                content: content.to_string(),
            },
        );
        true
    }

    fn invalidate(&mut self, key: &str) -> bool {
        self.entries.borrow_mut().remove(key).is_some()
    }
}
