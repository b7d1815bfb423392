use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use http::HeaderValue;

/// A cached token entry: the full header value (already including the scheme prefix, e.g.
/// `"Bearer abc"`) and its absolute expiry instant.
#[derive(Clone)]
struct Entry {
    header: Arc<HeaderValue>,
    expires_at: Instant,
}

/// Process-local mapping from cache key (`agent || scope`) to a cached token entry.
///
/// Concurrent-safe for read/insert. Does not itself serialize refreshes — ensuring at most
/// one credential acquisition is in flight per key is [`crate::handler::AuthHandler`]'s job.
#[derive(Default)]
pub(crate) struct TokenCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current non-expired entry for `key`, if any. Expired entries are evicted
    /// on read rather than left to a background sweep.
    pub fn try_get(&self, key: &str) -> Option<Arc<HeaderValue>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().expect("token cache lock poisoned");
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.header.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().expect("token cache lock poisoned");
        entries.remove(key);
        None
    }

    /// Inserts or overwrites the entry for `key`. There is no in-place update — a refresh
    /// always inserts a fresh entry for the same key.
    pub fn add(&self, key: String, header: Arc<HeaderValue>, ttl: Duration) {
        let mut entries = self.entries.write().expect("token cache lock poisoned");
        entries.insert(
            key,
            Entry {
                header,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
