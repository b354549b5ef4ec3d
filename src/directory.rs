//! The zone directory: the live mapping from zone id to its stats provider.
//!
//! Zones are created and destroyed outside this process, so the mapping is
//! rebuilt periodically from a [`ZoneSource`]. A refresh swaps in a complete
//! new snapshot behind an `Arc`; readers either see the old mapping or the
//! new one, never a partially rebuilt state, and a request that already
//! resolved a provider handle keeps using it even if a refresh lands
//! mid-request.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::provider;
use crate::provider::source::ZoneSource;
use crate::zone::ZoneId;

/// Default interval between directory refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

type Snapshot<P> = Arc<HashMap<ZoneId, Arc<P>>>;

#[derive(Debug)]
pub struct ZoneDirectory<P> {
    zones: RwLock<Snapshot<P>>,
}

impl<P> Default for ZoneDirectory<P> {
    fn default() -> Self {
        Self {
            zones: RwLock::new(Arc::new(HashMap::new())),
        }
    }
}

impl<P> ZoneDirectory<P> {
    /// Returns the provider handle for `zone` from the current snapshot, or
    /// `None` if the zone is unknown.
    pub fn lookup(&self, zone: &ZoneId) -> Option<Arc<P>> {
        self.snapshot().get(zone).cloned()
    }

    /// Replaces the whole mapping with a new snapshot.
    pub fn replace(&self, zones: HashMap<ZoneId, P>) {
        let next: Snapshot<P> = Arc::new(
            zones
                .into_iter()
                .map(|(zone, provider)| (zone, Arc::new(provider)))
                .collect(),
        );
        *self.zones.write().expect("zone directory lock poisoned") = next;
    }

    /// Discovers the current zone population and replaces the mapping,
    /// returning the number of known zones.
    pub async fn refresh<S>(&self, source: &S) -> provider::Result<usize>
    where
        S: ZoneSource<Provider = P>,
    {
        let zones = source.discover().await?;
        let count = zones.len();
        self.replace(zones);
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Snapshot<P> {
        Arc::clone(&self.zones.read().expect("zone directory lock poisoned"))
    }
}

impl<P: Send + Sync + 'static> ZoneDirectory<P> {
    /// Spawns the periodic directory refresh.
    ///
    /// The task holds only a weak reference, so dropping the directory ends
    /// the refresh as well. Dropping the returned handle aborts the task.
    pub fn start_refresher<S>(self: Arc<Self>, source: S, every: Duration) -> RefresherHandle
    where
        S: ZoneSource<Provider = P> + 'static,
    {
        let directory = Arc::downgrade(&self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(directory) = directory.upgrade() else { break };
                match directory.refresh(&source).await {
                    Ok(count) => log::debug!("zone directory refreshed: {count} zones"),
                    Err(err) => log::error!("zone directory refresh failed: {err}"),
                }
            }
        });

        RefresherHandle { handle }
    }
}

/// Owning handle for the background refresh task; aborts the task on drop.
#[derive(Debug)]
pub struct RefresherHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
