//! Raw per-zone stats acquisition.
//!
//! The collector consumes providers through the [`RawStatsProvider`] trait:
//! three independent, independently failable fetch operations per zone. The
//! production implementation, [`ZoneStatsProvider`], is deliberately thin —
//! kernel counters come from the host's `kstat` utility and filesystem usage
//! from `zfs list`, both invoked as external processes.

use std::collections::HashMap;
use std::future::Future;
use std::process::ExitStatus;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::zone::ZoneId;

pub mod kstat;
pub mod source;
pub mod zfs;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unexpected output from `{command}`: {detail}")]
    InvalidOutput { command: String, detail: String },
    #[error("system clock is before the UNIX epoch")]
    ClockSkew,
}
pub type Result<T> = std::result::Result<T, Error>;

/// Kernel instrumentation counters for one zone, keyed by statistic name.
pub type KernelCounters = HashMap<String, u64>;

/// Filesystem usage for a zone's dataset, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilesystemUsage {
    pub used: u64,
    pub available: u64,
}

impl FilesystemUsage {
    /// Resolves a metric source field by name.
    pub fn field(&self, name: &str) -> Option<u64> {
        match name {
            "used" => Some(self.used),
            "available" => Some(self.available),
            _ => None,
        }
    }
}

/// Wall-clock reading taken at collection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStats {
    /// Milliseconds since the UNIX epoch.
    pub now: u64,
}

impl TimeStats {
    /// Resolves a metric source field by name.
    pub fn field(&self, name: &str) -> Option<u64> {
        match name {
            "now" => Some(self.now),
            _ => None,
        }
    }
}

/// Per-zone access to the raw metric sources.
pub trait RawStatsProvider: Send + Sync {
    /// Reads the zone's kernel instrumentation counters.
    fn kernel_counters(&self) -> impl Future<Output = Result<KernelCounters>> + Send;

    /// Queries used and available bytes for the zone's dataset.
    fn filesystem_usage(&self) -> impl Future<Output = Result<FilesystemUsage>> + Send;

    /// Reads the current wall-clock time.
    fn time_stats(&self) -> impl Future<Output = Result<TimeStats>> + Send;
}

/// Production provider backed by the host's `kstat` and `zfs` utilities.
///
/// Kernel counters are merged from three kstat queries: the zone's `link`
/// statistics (aggregated over all of its links), its `memory_cap` instance,
/// and its `zones` miscellaneous instance.
#[derive(Debug, Clone)]
pub struct ZoneStatsProvider {
    zone: ZoneId,
    instance: u32,
    kstat: kstat::KstatInvoker,
    zfs: zfs::ZfsInvoker,
}

impl ZoneStatsProvider {
    pub fn new(
        zone: ZoneId,
        instance: u32,
        kstat: kstat::KstatInvoker,
        zfs: zfs::ZfsInvoker,
    ) -> Self {
        Self {
            zone,
            instance,
            kstat,
            zfs,
        }
    }

    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }
}

impl RawStatsProvider for ZoneStatsProvider {
    async fn kernel_counters(&self) -> Result<KernelCounters> {
        let instance = self.instance.to_string();
        // Zone-owned links are named `z<instance>_<link>`.
        let link_prefix = format!("z{}_", self.instance);

        let link_args = ["-c", "net", "-m", "link"];
        let memory_args = ["-c", "zone_memory_cap", "-m", "memory_cap", "-i", &instance];
        let misc_args = ["-c", "zone_misc", "-m", "zones", "-i", &instance];
        let (links, memory, misc) = tokio::join!(
            self.kstat.read(&link_args),
            self.kstat.read(&memory_args),
            self.kstat.read(&misc_args),
        );

        let mut counters = KernelCounters::new();
        for row in misc?.into_iter().chain(memory?) {
            if let Some(value) = row.numeric() {
                counters.insert(row.statistic, value);
            }
        }
        for row in links? {
            if !row.name.starts_with(&link_prefix) {
                continue;
            }
            if let Some(value) = row.numeric() {
                *counters.entry(row.statistic).or_insert(0) += value;
            }
        }

        Ok(counters)
    }

    async fn filesystem_usage(&self) -> Result<FilesystemUsage> {
        self.zfs.usage(&format!("zones/{}", self.zone)).await
    }

    async fn time_stats(&self) -> Result<TimeStats> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::ClockSkew)?;
        Ok(TimeStats {
            now: now.as_millis() as u64,
        })
    }
}
