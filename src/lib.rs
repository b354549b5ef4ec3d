//! Zone metric agent: a per-host exporter that reads kernel instrumentation
//! counters and filesystem usage for the host's zones and serves them in a
//! line-oriented text exposition format over HTTP, keyed by zone UUID.
//!
//! Expensive readings are served from a TTL cache with per-group lifetimes;
//! the set of known zones is refreshed periodically and swapped in as an
//! immutable snapshot.

use std::sync::Arc;

pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod directory;
pub mod provider;
pub mod zone;

use provider::source::KstatZoneSource;

/// Runs the metric agent with the given configuration.
///
/// Primes the zone directory, starts the periodic directory refresh and
/// cache sweep, and serves the HTTP API. A failed initial discovery is
/// logged and retried by the periodic refresh rather than aborting startup.
pub async fn run(config: config::Config) {
    log::info!("metric agent config: {:?}", config);

    let source = KstatZoneSource::new(config.kstat_path.clone(), config.zfs_path.clone());
    let directory = Arc::new(directory::ZoneDirectory::default());
    match directory.refresh(&source).await {
        Ok(count) => log::info!("zone directory primed with {count} zones"),
        Err(err) => log::error!("initial zone discovery failed: {err}"),
    }
    let _refresher = Arc::clone(&directory).start_refresher(source, config.refresh_interval());

    let cache = Arc::new(cache::Cache::default());
    let _sweeper = Arc::clone(&cache).start_sweeper(config.sweep_interval());

    let collector = Arc::new(collector::Collector::new(
        Arc::clone(&directory),
        cache,
        config.kstat_ttl(),
        config.zfs_ttl(),
    ));

    log::info!("metric agent listening on port {}", config.port);
    api::APIServer::new(collector)
        .listen(("0.0.0.0", config.port))
        .await
}
