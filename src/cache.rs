//! String-keyed TTL cache with lazy eviction on read and a periodic
//! background sweep.
//!
//! The primary map is the source of truth. A secondary index groups keys by
//! their TTL duration: entries sharing a TTL are appended in insertion order,
//! so expired entries always form a prefix of their bucket and a sweep pass
//! can stop at the first live entry. A key re-inserted under a different TTL
//! leaves a stale reference in its old bucket; the sweep discards such
//! references without touching the backing entry.
//!
//! Reads observe correct data regardless of sweep timing, because [`Cache::get`]
//! checks expiry itself and evicts expired entries on the spot.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default interval between background sweep passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ttl must be greater than zero")]
    InvalidTtl,
    #[error("cache key must not be empty")]
    EmptyKey,
}
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    ttl: Duration,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.inserted_at + self.ttl
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// TTL (in milliseconds) to keys, in insertion order.
    buckets: HashMap<u128, VecDeque<String>>,
}

/// A TTL key/value store.
///
/// All operations leave the primary map and the TTL-bucket index mutually
/// consistent before releasing the lock, so concurrent readers never observe
/// a partial update.
#[derive(Debug)]
pub struct Cache<V> {
    inner: Mutex<Inner<V>>,
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                buckets: HashMap::new(),
            }),
        }
    }
}

impl<V> Cache<V> {
    /// Stores `value` under `key` for `ttl`, overwriting any existing entry
    /// and resetting its insertion time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTtl`] for a zero TTL and [`Error::EmptyKey`]
    /// for an empty key.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::InvalidTtl);
        }
        let key = key.into();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let mut inner = self.lock();
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                ttl,
                inserted_at: Instant::now(),
            },
        );
        inner.buckets.entry(ttl.as_millis()).or_default().push_back(key);

        Ok(())
    }

    /// Removes the entry for `key`, reporting whether it existed.
    ///
    /// The bucket reference is left behind; the next sweep discards it as
    /// stale.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Returns the number of physically stored entries, including expired
    /// entries that have not been evicted yet.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Evicts the expired prefix of every TTL bucket.
    ///
    /// Entries within one bucket share a TTL and are inserted in time order,
    /// so their expiries are monotonically non-decreasing and the pass stops
    /// at the first live entry. A leading reference whose backing entry is
    /// absent or carries a different TTL is stale: it is dropped and the pass
    /// continues. Live entries are never evicted.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        let Inner { entries, buckets } = &mut *inner;

        buckets.retain(|&ttl_millis, bucket| {
            while let Some(key) = bucket.front() {
                match entries.get(key.as_str()) {
                    // Stale reference: the key was removed, or re-inserted
                    // under a different TTL.
                    None => {}
                    Some(entry) if entry.ttl.as_millis() != ttl_millis => {}
                    Some(entry) if entry.is_expired(now) => {
                        entries.remove(key.as_str());
                    }
                    Some(_) => break,
                }
                bucket.pop_front();
            }

            !bucket.is_empty()
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().expect("cache mutex poisoned")
    }
}

impl<V: Clone> Cache<V> {
    /// Returns the live value for `key`, or `None` if the key was never
    /// inserted or its TTL has elapsed. An expired entry is evicted on read.
    ///
    /// Presence is signaled by the `Option` alone; a stored zero is a value
    /// like any other.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                inner.entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }
}

impl<V: Send + 'static> Cache<V> {
    /// Spawns the periodic background sweep for this cache.
    ///
    /// The task holds only a weak reference, so dropping the cache ends the
    /// sweep as well. Dropping the returned handle aborts the task.
    pub fn start_sweeper(self: Arc<Self>, every: Duration) -> SweeperHandle {
        let cache = Arc::downgrade(&self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                cache.sweep();
            }
        });

        SweeperHandle { handle }
    }
}

/// Owning handle for a background sweep task. Aborting on drop ties the task
/// lifetime to the owner instead of leaving an unreferenced timer behind.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_insert_then_get() {
        let cache = Cache::default();
        cache.insert("answer", 42u64, HOUR).unwrap();
        assert_eq!(cache.get("answer"), Some(42));
    }

    #[test]
    fn test_get_unknown_key() {
        let cache: Cache<u64> = Cache::default();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_get_evicts_expired_entry() {
        let cache = Cache::default();
        cache.insert("k", 1u64, Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("k"), None);
        // Lazy deletion removed the entry, not just hid it.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_then_remove() {
        let cache = Cache::default();
        cache.insert("k", 1u64, HOUR).unwrap();
        assert!(cache.remove("k"));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_remove_unknown_key() {
        let cache: Cache<u64> = Cache::default();
        assert!(!cache.remove("k"));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let cache = Cache::default();
        let err = cache.insert("k", 1u64, Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::InvalidTtl));
    }

    #[test]
    fn test_empty_key_rejected() {
        let cache = Cache::default();
        let err = cache.insert("", 1u64, HOUR).unwrap_err();
        assert!(matches!(err, Error::EmptyKey));
    }

    #[test]
    fn test_reinsert_resets_expiry() {
        let cache = Cache::default();
        cache.insert("k", 1u64, Duration::from_millis(50)).unwrap();
        // Re-insert under a different TTL; the old bucket's deadline must not
        // apply anymore.
        cache.insert("k", 2u64, HOUR).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_overwrite_returns_latest_value() {
        let cache = Cache::default();
        cache.insert("k", 1u64, HOUR).unwrap();
        cache.insert("k", 2u64, HOUR).unwrap();
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_sweep_evicts_expired_prefix_only() {
        let cache = Cache::default();
        let ttl = Duration::from_millis(50);
        cache.insert("old", 1u64, ttl).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        cache.insert("new", 2u64, ttl).unwrap();

        cache.sweep();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn test_sweep_never_evicts_live_entries() {
        let cache = Cache::default();
        cache.insert("a", 1u64, HOUR).unwrap();
        cache.insert("b", 2u64, HOUR).unwrap();

        cache.sweep();

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_sweep_skips_stale_bucket_reference() {
        let cache = Cache::default();
        cache.insert("k", 1u64, Duration::from_millis(50)).unwrap();
        cache.insert("k", 2u64, HOUR).unwrap();
        std::thread::sleep(Duration::from_millis(120));

        // The 50ms bucket still references `k`, but the backing entry now
        // lives in the one-hour bucket and must survive the sweep.
        cache.sweep();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_sweep_discards_removed_key_reference() {
        let cache = Cache::default();
        cache.insert("gone", 1u64, HOUR).unwrap();
        cache.insert("kept", 2u64, HOUR).unwrap();
        assert!(cache.remove("gone"));

        // `gone` leads the bucket as a stale reference; the pass must step
        // over it without stopping.
        cache.sweep();

        assert_eq!(cache.get("kept"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_background_sweeper_evicts_without_reads() {
        let cache = Arc::new(Cache::default());
        let _sweeper = Arc::clone(&cache).start_sweeper(Duration::from_millis(50));

        cache.insert("k", 1u64, Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.len(), 0);
    }
}
