//! HTTP front end.
//!
//! Two routes expose the collector: `GET /{zone}/metrics` addresses a zone
//! by path, and `GET /metrics` derives the zone from the leading label of
//! the request's Host header (scrapers reach zones through per-zone DNS
//! names). Unknown and malformed zone identifiers yield `404` with an empty
//! body; failures inside a metric group surface in the process log, not in
//! the exposition payload.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::ToSocketAddrs;

use crate::collector::{self, Collector};
use crate::provider::RawStatsProvider;
use crate::zone::ZoneId;

/// Default listening port.
pub const EXPORTER_PORT: u16 = 9163;

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new<P: RawStatsProvider + 'static>(collector: Arc<Collector<P>>) -> Self {
        let router = axum::Router::new()
            .route("/metrics", get(host_metrics::<P>))
            .route("/{zone}/metrics", get(zone_metrics::<P>))
            .with_state(collector);
        Self { router }
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("TCP Listener bind");
        axum::serve(listener, self.router.into_make_service())
            .await
            .expect("HTTP server")
    }
}

async fn zone_metrics<P: RawStatsProvider + 'static>(
    State(collector): State<Arc<Collector<P>>>,
    Path(zone): Path<String>,
) -> Response {
    render(collector.as_ref(), &zone).await
}

async fn host_metrics<P: RawStatsProvider + 'static>(
    State(collector): State<Arc<Collector<P>>>,
    headers: HeaderMap,
) -> Response {
    let Some(zone) = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|host| host.split('.').next())
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    render(collector.as_ref(), zone).await
}

async fn render<P: RawStatsProvider>(collector: &Collector<P>, zone: &str) -> Response {
    let Ok(zone) = zone.parse::<ZoneId>() else {
        log::debug!("metrics requested for malformed zone id `{zone}`");
        return StatusCode::NOT_FOUND.into_response();
    };

    match collector.collect(&zone).await {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain")], body).into_response(),
        Err(collector::Error::UnknownZone(zone)) => {
            log::debug!("metrics requested for unknown zone `{zone}`");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::cache::Cache;
    use crate::directory::ZoneDirectory;
    use crate::provider::{self, FilesystemUsage, KernelCounters, TimeStats};

    use super::*;

    const ZONE: &str = "5e3f1ea8-8372-465f-9c58-3ff12e03e15c";

    struct FakeProvider;

    impl RawStatsProvider for FakeProvider {
        async fn kernel_counters(&self) -> provider::Result<KernelCounters> {
            Ok(KernelCounters::from([("nsec_user".to_owned(), 1000u64)]))
        }

        async fn filesystem_usage(&self) -> provider::Result<FilesystemUsage> {
            Ok(FilesystemUsage {
                used: 1024,
                available: 2048,
            })
        }

        async fn time_stats(&self) -> provider::Result<TimeStats> {
            Ok(TimeStats {
                now: 1_700_000_000_000,
            })
        }
    }

    fn router() -> axum::Router {
        let directory = Arc::new(ZoneDirectory::default());
        directory.replace(HashMap::from([(ZoneId::new(ZONE).unwrap(), FakeProvider)]));
        let collector = Arc::new(Collector::new(
            directory,
            Arc::new(Cache::default()),
            Duration::from_secs(10),
            Duration::from_secs(300),
        ));
        APIServer::new(collector).router
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_zone_metrics_route() {
        let request = Request::builder()
            .uri(format!("/{ZONE}/metrics"))
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = body_text(response).await;
        assert!(body.contains("cpu_agg_usage 1000\n"));
        assert!(body.contains("zfs_used 1024\n"));
    }

    #[tokio::test]
    async fn test_host_metrics_route() {
        let request = Request::builder()
            .uri("/metrics")
            .header(header::HOST, format!("{ZONE}.cmon.example.com:9163"))
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("cpu_agg_usage 1000\n"));
    }

    #[tokio::test]
    async fn test_unknown_zone_is_not_found() {
        let request = Request::builder()
            .uri("/9a2b64fc-01d4-4a08-9e3c-aa7f0e2b41d0/metrics")
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_zone_is_not_found() {
        let request = Request::builder()
            .uri("/not-a-zone/metrics")
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_host_metrics_with_unknown_host_label() {
        let request = Request::builder()
            .uri("/metrics")
            .header(header::HOST, "localhost:9163")
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
