//! Request-time collection orchestration.
//!
//! For each metrics request the collector resolves the zone against the
//! directory, assembles the kernel-counter, filesystem, and wall-clock
//! metric groups, and renders them into one exposition-format body. The two
//! expensive groups are served from the TTL cache when possible and fetched
//! from the zone's provider on a miss; the wall-clock group is always
//! fetched fresh. Group fetches run concurrently, but the response always
//! concatenates the groups in a fixed order.
//!
//! A provider failure for one group is logged and degrades that group to its
//! HELP/TYPE headers; the other groups still complete the response.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::directory::ZoneDirectory;
use crate::provider::{FilesystemUsage, KernelCounters, RawStatsProvider};
use crate::zone::ZoneId;

pub mod families;
pub mod format;

/// Cache key prefix for the kernel-counter group.
const KSTAT_KEY_PREFIX: &str = "kstat;";
/// Cache key prefix for the filesystem group.
const ZFS_KEY_PREFIX: &str = "zfs;";

/// Default TTL for cached kernel counters. Volatile and cheap to refresh.
pub const DEFAULT_KSTAT_TTL: Duration = Duration::from_secs(10);
/// Default TTL for cached filesystem usage. Expensive to query, changes
/// slowly.
pub const DEFAULT_ZFS_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown zone `{0}`")]
    UnknownZone(ZoneId),
}
pub type Result<T> = std::result::Result<T, Error>;

/// A cached raw metric group reading.
#[derive(Debug, Clone)]
pub enum Sample {
    Kernel(Arc<KernelCounters>),
    Filesystem(FilesystemUsage),
}

pub struct Collector<P> {
    directory: Arc<ZoneDirectory<P>>,
    cache: Arc<Cache<Sample>>,
    kstat_ttl: Duration,
    zfs_ttl: Duration,
}

impl<P: RawStatsProvider> Collector<P> {
    pub fn new(
        directory: Arc<ZoneDirectory<P>>,
        cache: Arc<Cache<Sample>>,
        kstat_ttl: Duration,
        zfs_ttl: Duration,
    ) -> Self {
        Self {
            directory,
            cache,
            kstat_ttl,
            zfs_ttl,
        }
    }

    /// Assembles the complete exposition-format body for `zone`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownZone`] if the zone is absent from the
    /// directory's current snapshot; no provider is invoked in that case.
    pub async fn collect(&self, zone: &ZoneId) -> Result<String> {
        let provider = self
            .directory
            .lookup(zone)
            .ok_or_else(|| Error::UnknownZone(zone.clone()))?;

        let (kernel, filesystem) = tokio::join!(
            self.kernel_sample(zone, provider.as_ref()),
            self.filesystem_sample(zone, provider.as_ref()),
        );
        let time = match provider.time_stats().await {
            Ok(time) => Some(time),
            Err(err) => {
                log::error!("time stats failed for zone `{zone}`: {err}");
                None
            }
        };

        let mut out = String::new();
        for family in families::KERNEL_FAMILIES {
            let raw = kernel
                .as_ref()
                .and_then(|counters| counters.get(family.source).copied());
            format::append_family(&mut out, family, family.resolve(raw));
        }
        for family in families::FILESYSTEM_FAMILIES {
            let raw = filesystem.as_ref().and_then(|usage| usage.field(family.source));
            format::append_family(&mut out, family, family.resolve(raw));
        }
        for family in families::TIME_FAMILIES {
            let raw = time.as_ref().and_then(|time| time.field(family.source));
            format::append_family(&mut out, family, family.resolve(raw));
        }

        Ok(out)
    }

    async fn kernel_sample(&self, zone: &ZoneId, provider: &P) -> Option<Arc<KernelCounters>> {
        let key = format!("{KSTAT_KEY_PREFIX}{zone}");
        if let Some(Sample::Kernel(counters)) = self.cache.get(&key) {
            return Some(counters);
        }

        match provider.kernel_counters().await {
            Ok(counters) => {
                let counters = Arc::new(counters);
                if let Err(err) =
                    self.cache
                        .insert(key, Sample::Kernel(Arc::clone(&counters)), self.kstat_ttl)
                {
                    log::warn!("failed to cache kernel counters for zone `{zone}`: {err}");
                }
                Some(counters)
            }
            Err(err) => {
                log::error!("kernel counter collection failed for zone `{zone}`: {err}");
                None
            }
        }
    }

    async fn filesystem_sample(&self, zone: &ZoneId, provider: &P) -> Option<FilesystemUsage> {
        let key = format!("{ZFS_KEY_PREFIX}{zone}");
        if let Some(Sample::Filesystem(usage)) = self.cache.get(&key) {
            return Some(usage);
        }

        match provider.filesystem_usage().await {
            Ok(usage) => {
                if let Err(err) = self.cache.insert(key, Sample::Filesystem(usage), self.zfs_ttl) {
                    log::warn!("failed to cache filesystem usage for zone `{zone}`: {err}");
                }
                Some(usage)
            }
            Err(err) => {
                log::error!("filesystem usage collection failed for zone `{zone}`: {err}");
                None
            }
        }
    }
}
