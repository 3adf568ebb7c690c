use super::model::Manifest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Recently resolved manifests, keyed by normalized URL. Lets a download reuse
/// the manifest the client just looked at instead of asking the extractor again.
#[derive(Clone)]
pub struct ManifestCache {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
    capacity: usize,
}

struct Entry {
    manifest: Arc<Manifest>,
    stored_at: Instant,
}

impl ManifestCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<Manifest>> {
        let mut map = self.inner.lock();
        match map.get(url) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.manifest.clone()),
            Some(_) => {
                map.remove(url);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, url: &str, manifest: Arc<Manifest>) {
        let mut map = self.inner.lock();
        map.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);

        if !map.contains_key(url) && map.len() >= self.capacity {
            let oldest = map
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                map.remove(&key);
            }
        }

        map.insert(
            url.to_string(),
            Entry {
                manifest,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
