//! Last-known device status, keyed by status topic.
//!
//! Written only by the MQTT receiver task, read by any number of request
//! handlers. Entries are overwritten in place and never removed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared handle to the status map. Cloning is cheap and every clone sees the
/// same entries.
#[derive(Clone, Default)]
pub struct StatusCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last payload stored under `topic`, or `None` if nothing has arrived yet.
    pub fn get(&self, topic: &str) -> Option<String> {
        // A panicking writer cannot leave the map half-updated, so a poisoned
        // lock is still safe to read.
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(topic).cloned()
    }

    /// Store `payload` under `topic`, replacing any previous value.
    pub fn insert(&self, topic: impl Into<String>, payload: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(topic.into(), payload.into());
    }

    /// Number of distinct topics seen so far.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let cache = StatusCache::new();
        assert_eq!(cache.get("devices/fan202/status"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let cache = StatusCache::new();
        cache.insert("devices/fan202/status", "on");
        cache.insert("devices/fan202/status", "off");
        assert_eq!(cache.get("devices/fan202/status").as_deref(), Some("off"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clones_share_entries() {
        let writer = StatusCache::new();
        let reader = writer.clone();
        writer.insert("devices/a/status", "42");
        assert_eq!(reader.get("devices/a/status").as_deref(), Some("42"));
    }

    #[test]
    fn concurrent_readers_see_single_writer() {
        let cache = StatusCache::new();
        let writer = cache.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                writer.insert("devices/x/status", i.to_string());
            }
        });
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let c = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(v) = c.get("devices/x/status") {
                            assert!(v.parse::<u32>().is_ok());
                        }
                    }
                })
            })
            .collect();
        handle.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cache.get("devices/x/status").as_deref(), Some("999"));
    }
}
