//! Zone enumeration for directory refresh.
//!
//! Every zone with a CPU cap accounting entry shows up in the `task_caps`
//! kstat class with its name and kstat instance id; that set, minus names
//! that are not zone UUIDs (the global zone in particular), is the host's
//! current zone population.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

use crate::zone::ZoneId;

use super::kstat::{KstatInvoker, KstatRow};
use super::zfs::ZfsInvoker;
use super::{RawStatsProvider, Result, ZoneStatsProvider};

/// Discovers the current set of zones, yielding a stats provider per zone.
pub trait ZoneSource: Send + Sync {
    type Provider: RawStatsProvider + 'static;

    fn discover(&self) -> impl Future<Output = Result<HashMap<ZoneId, Self::Provider>>> + Send;
}

/// Enumerates zones from the per-zone `task_caps` kernel counters.
pub struct KstatZoneSource {
    kstat: KstatInvoker,
    zfs: ZfsInvoker,
}

impl KstatZoneSource {
    pub fn new(kstat_path: impl Into<PathBuf>, zfs_path: impl Into<PathBuf>) -> Self {
        Self {
            kstat: KstatInvoker::new(kstat_path),
            zfs: ZfsInvoker::new(zfs_path),
        }
    }
}

impl ZoneSource for KstatZoneSource {
    type Provider = ZoneStatsProvider;

    async fn discover(&self) -> Result<HashMap<ZoneId, ZoneStatsProvider>> {
        let rows = self
            .kstat
            .read(&["-c", "task_caps", "-m", "caps", "-s", "zonename"])
            .await?;

        Ok(zones_from_rows(&rows)
            .into_iter()
            .map(|(zone, instance)| {
                let provider = ZoneStatsProvider::new(
                    zone.clone(),
                    instance,
                    self.kstat.clone(),
                    self.zfs.clone(),
                );
                (zone, provider)
            })
            .collect())
    }
}

/// Extracts `(zone, kstat instance)` pairs from `task_caps` rows.
fn zones_from_rows(rows: &[KstatRow]) -> Vec<(ZoneId, u32)> {
    rows.iter()
        .filter(|row| row.statistic == "zonename")
        .filter_map(|row| match ZoneId::from_str(&row.value) {
            Ok(zone) => Some((zone, row.instance)),
            Err(err) => {
                log::debug!("skipping non-zone kstat entry `{}`: {}", row.value, err);
                None
            }
        })
        .collect()
}
