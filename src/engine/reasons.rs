/// TTL cache for generated recommendation reasons
///
/// Reason text for an item without query context is stable for minutes at a
/// time, and generation is the slowest call in a request. Entries expire
/// lazily on read; there is no background sweeper. Query-contextual reasons
/// are never cached (the context changes per request), and neither are
/// fallback texts (a later request should retry generation).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry {
    text: String,
    created: Instant,
}

/// In-process reason cache keyed by item id.
pub struct ReasonCache {
    ttl: Duration,
    entries: RwLock<HashMap<i64, Entry>>,
}

impl ReasonCache {
    pub fn new(ttl: Duration) -> Self {
        ReasonCache {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a live entry. An entry is live while its age is at most the
    /// TTL; expired entries read as absent and are removed.
    pub fn get(&self, item_id: i64) -> Option<String> {
        {
            let entries = self.entries.read().ok()?;
            match entries.get(&item_id) {
                Some(entry) if entry.created.elapsed() <= self.ttl => {
                    return Some(entry.text.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get(&item_id) {
                if entry.created.elapsed() > self.ttl {
                    entries.remove(&item_id);
                }
            }
        }
        None
    }

    /// Store or refresh an entry. Last write wins.
    pub fn put(&self, item_id: i64, text: String) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                item_id,
                Entry {
                    text,
                    created: Instant::now(),
                },
            );
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}
