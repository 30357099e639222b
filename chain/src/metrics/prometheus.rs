//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed consensus metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Ledger- and consensus-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the
/// state machine, validator, and voting coordinator.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Blocks accepted, labeled by block `type` (send/receive/open).
    pub blocks_accepted: IntCounterVec,
    /// Blocks rejected, labeled by `reason` (the closed rejection set).
    pub blocks_rejected: IntCounterVec,
    /// Vote rounds resolved, labeled by `outcome`
    /// (confirmed/rejected/timed_out).
    pub vote_rounds_resolved: IntCounterVec,
    /// Wall-clock time from `broadcast` to round resolution, in seconds.
    pub vote_round_seconds: Histogram,
    /// Number of peers currently marked live in the registry.
    pub live_peers: IntGauge,
    /// Total peer-liveness probes sent.
    pub liveness_probes: IntCounter,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_accepted = IntCounterVec::new(
            Opts::new("blocks_accepted_total", "Blocks accepted by block type"),
            &["type"],
        )?;
        registry.register(Box::new(blocks_accepted.clone()))?;

        let blocks_rejected = IntCounterVec::new(
            Opts::new("blocks_rejected_total", "Blocks rejected by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let vote_rounds_resolved = IntCounterVec::new(
            Opts::new("vote_rounds_resolved_total", "Vote rounds resolved by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(vote_rounds_resolved.clone()))?;

        let vote_round_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "vote_round_seconds",
                "Time from broadcast to a vote round resolving, in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
        )?;
        registry.register(Box::new(vote_round_seconds.clone()))?;

        let live_peers = IntGauge::with_opts(Opts::new(
            "live_peers",
            "Number of peers currently marked live in the peer registry",
        ))?;
        registry.register(Box::new(live_peers.clone()))?;

        let liveness_probes = IntCounter::with_opts(Opts::new(
            "liveness_probes_total",
            "Total number of peer liveness probes sent",
        ))?;
        registry.register(Box::new(liveness_probes.clone()))?;

        Ok(Self {
            blocks_accepted,
            blocks_rejected,
            vote_rounds_resolved,
            vote_round_seconds,
            live_peers,
            liveness_probes,
        })
    }
}

/// Wrapper around a Prometheus registry and the consensus metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the ledger metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        Ok(Self { registry, ledger })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn ledger_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = LedgerMetrics::register(&registry).expect("register metrics");

        metrics.blocks_accepted.with_label_values(&["send"]).inc();
        metrics.blocks_rejected.with_label_values(&["balance"]).inc();
        metrics.vote_round_seconds.observe(0.2);
        metrics.live_peers.set(3);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.ledger.vote_round_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("vote_round_seconds"));
    }
}
