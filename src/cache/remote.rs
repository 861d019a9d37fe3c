use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::RwLock;

use crate::models::ImageRecord;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    inserted_at: Instant,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            inserted_at: now,
            expires_at: now + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }

    fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.inserted_at)
    }
}

/// Records for images that were fetched and converted from a remote source.
/// Bounded by entry count and age; the oldest entry goes first when full.
pub struct RemoteImageCache {
    images: RwLock<HashMap<String, CacheEntry<ImageRecord>>>,
    capacity: usize,
    cache_duration: Duration,
}

impl RemoteImageCache {
    pub fn new(capacity: usize, cache_duration: Duration) -> Self {
        Self {
            images: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            cache_duration,
        }
    }

    pub fn get(&self, id: &str) -> Option<ImageRecord> {
        let images = self.images.read();
        let entry = images.get(id)?;

        if entry.is_expired() || !entry.data.is_available() {
            return None;
        }

        debug!("Retrieving {} from remote images cache (age {}s)", id, entry.age().as_secs());
        Some(entry.data.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn store(&self, record: ImageRecord) {
        let mut images = self.images.write();

        images.retain(|_, entry| !entry.is_expired());

        if images.len() >= self.capacity && !images.contains_key(&record.identifier) {
            let oldest = images
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(id, _)| id.clone());

            if let Some(id) = oldest {
                debug!("Evicting {} from remote images cache", id);
                images.remove(&id);
            }
        }

        images.insert(
            record.identifier.clone(),
            CacheEntry::new(record, self.cache_duration),
        );
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }
}
