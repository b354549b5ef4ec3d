//! Agent configuration.
//!
//! Loaded from a JSON config file with camelCase keys; every field has a
//! default, so a missing file yields a fully working configuration. The
//! `RUST_LOG` environment variable overrides the configured log level.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::api::EXPORTER_PORT;
use crate::cache::DEFAULT_SWEEP_INTERVAL;
use crate::collector::{DEFAULT_KSTAT_TTL, DEFAULT_ZFS_TTL};
use crate::directory::DEFAULT_REFRESH_INTERVAL;

/// Install path of the agent's config file.
pub const DEFAULT_CONFIG_PATH: &str = "/opt/smartdc/agents/etc/metric-agent.config.json";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub log_level: String,
    pub port: u16,
    pub cache_sweep_interval_seconds: u64,
    pub kstat_ttl_seconds: u64,
    pub zfs_ttl_seconds: u64,
    pub refresh_interval_seconds: u64,
    pub kstat_path: PathBuf,
    pub zfs_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            port: EXPORTER_PORT,
            cache_sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL.as_secs(),
            kstat_ttl_seconds: DEFAULT_KSTAT_TTL.as_secs(),
            zfs_ttl_seconds: DEFAULT_ZFS_TTL.as_secs(),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL.as_secs(),
            kstat_path: PathBuf::from("/usr/bin/kstat"),
            zfs_path: PathBuf::from("/usr/sbin/zfs"),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`. A missing file yields the
    /// defaults; an unreadable or malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&data).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_seconds)
    }

    pub fn kstat_ttl(&self) -> Duration {
        Duration::from_secs(self.kstat_ttl_seconds)
    }

    pub fn zfs_ttl(&self) -> Duration {
        Duration::from_secs(self.zfs_ttl_seconds)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 9163);
        assert_eq!(config.kstat_ttl(), Duration::from_secs(10));
        assert_eq!(config.zfs_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load("/definitely/does/not/exist.json").unwrap();
        assert_eq!(config.port, Config::default().port);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"logLevel": "debug", "kstatTtlSeconds": 5, "port": 9999}}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.kstat_ttl(), Duration::from_secs(5));
        assert_eq!(config.port, 9999);
        // Untouched fields keep their defaults.
        assert_eq!(config.zfs_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(Error::Parse { .. })
        ));
    }
}
