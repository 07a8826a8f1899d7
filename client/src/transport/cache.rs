/// A cached subscribe payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub etag: String,
    pub content: String,
}

/// Optional persistent store for subscribe payloads, keyed by channel cache key
pub trait CacheService {
    fn lookup(&self, key: &str) -> Option<CacheEntry>;

    /// Returns whether the payload was stored
    fn store(&mut self, key: &str, etag: &str, content: &str) -> bool;

    /// Returns whether an entry was removed
    fn invalidate(&mut self, key: &str) -> bool;
}
