//! Ledger node binary.
//!
//! Wires the `chain` library into a running process: loads config and
//! the node's signing keypair, opens the account store, stands up peer
//! discovery, voting, subscriptions and the ledger-sync listener, then
//! serves the WebSocket control channel described in §6.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::signal;

use chain::{
    FileBlockStore, KeyPair, MetricsRegistry, PeerRegistry, StateMachine, Subscriptions,
    VotingCoordinator, run_prometheus_http_server,
};
use routes::{health, ws};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()))
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let chain_cfg = config::load_chain_config();

    // ---------------------------
    // Keys
    // ---------------------------

    let keys = KeyPair::load_or_generate(&chain_cfg.keys.private_key_path, &chain_cfg.keys.public_key_path)
        .map_err(|e| format!("failed to load or generate keypair: {e}"))?;
    tracing::info!(address = %keys.address, "node identity loaded");

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );
    if chain_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = chain_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage
    // ---------------------------

    let store = Arc::new(
        FileBlockStore::open(&chain_cfg.storage.base_dir)
            .map_err(|e| format!("failed to open account store at {}: {e:?}", chain_cfg.storage.base_dir.display()))?,
    );

    tracing::info!("verifying ledger on disk before serving");
    if let Err(e) = chain::validation::verify_ledger(store.as_ref()) {
        return Err(format!("ledger failed whole-ledger verification at startup: {e}"));
    }

    // ---------------------------
    // Listening port, with fallback if the primary is already taken
    // ---------------------------

    let (listener, listen_port) = bind_with_fallback(&chain_cfg).await?;

    // ---------------------------
    // Public IP (best-effort; a bootstrap fault here just means the
    // node proceeds reachable only by localhost/LAN address)
    // ---------------------------

    let public_ip = discover_public_ip(&chain_cfg.network.ipify_url).await;
    if let Some(ip) = &public_ip {
        tracing::info!(public_ip = %ip, "discovered public IP");
    } else {
        tracing::warn!("could not determine public IP; proceeding with local addresses only");
    }

    let self_urls = AppState::self_urls(listen_port, public_ip.as_deref());

    // ---------------------------
    // Peers, subscriptions, consensus
    // ---------------------------

    let peers = Arc::new(PeerRegistry::new(self_urls));
    let subscriptions = Arc::new(Subscriptions::new());
    let coordinator = Arc::new(VotingCoordinator::new(
        chain_cfg.consensus.clone(),
        peers.clone(),
        // The coordinator signs outgoing vote packets with its own
        // identity; block signatures are a separate per-account key.
        KeyPair::from_private_pem(
            &std::fs::read_to_string(&chain_cfg.keys.private_key_path)
                .map_err(|e| format!("failed to re-read private key: {e}"))?,
        )
        .map_err(|e| format!("failed to reload keypair for coordinator: {e}"))?,
        metrics.clone(),
    ));

    let state_machine = StateMachine::new(
        store.clone() as Arc<dyn chain::BlockStore>,
        subscriptions.clone(),
        coordinator.clone(),
        metrics.clone(),
    );

    let app_state: SharedState = Arc::new(AppState {
        config: chain_cfg.clone(),
        store: store.clone(),
        state_machine,
        peers: peers.clone(),
        subscriptions,
        coordinator,
        keys,
        metrics,
    });

    // ---------------------------
    // Ledger sync server (whole-ledger snapshot transfer for joiners)
    // ---------------------------

    let sync_store: Arc<dyn chain::BlockStore> = store.clone() as Arc<dyn chain::BlockStore>;
    let sync_bind = format!("0.0.0.0:{}", listen_port + 1);
    tokio::spawn(async move {
        if let Err(e) = chain::sync::run_server(sync_store, &sync_bind).await {
            tracing::error!(error = %e, "ledger sync server exited");
        }
    });

    // ---------------------------
    // Bootstrap: register with the first reachable entrypoint, then
    // pull its ledger snapshot. A node with no reachable entrypoint
    // just proceeds solo as the first node on the network.
    // ---------------------------

    bootstrap(&app_state, listen_port).await;

    // ---------------------------
    // WebSocket control channel
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        .with_state(app_state);

    tracing::info!("node listening on ws://0.0.0.0:{}/ws", listen_port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| format!("node server error: {e}"))?;

    Ok(())
}

/// Binds the primary port, falling back to `network.fallback_port` if
/// it's already taken by another process on this host.
async fn bind_with_fallback(cfg: &chain::ChainConfig) -> Result<(tokio::net::TcpListener, u16), String> {
    let primary_addr = format!("0.0.0.0:{}", cfg.network.primary_port);
    match tokio::net::TcpListener::bind(&primary_addr).await {
        Ok(listener) => Ok((listener, cfg.network.primary_port)),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "primary port {} unavailable, falling back to {}",
                cfg.network.primary_port, cfg.network.fallback_port
            );
            let fallback_addr = format!("0.0.0.0:{}", cfg.network.fallback_port);
            let listener = tokio::net::TcpListener::bind(&fallback_addr)
                .await
                .map_err(|e| format!("failed to bind fallback port {}: {e}", cfg.network.fallback_port))?;
            Ok((listener, cfg.network.fallback_port))
        }
    }
}

/// Best-effort public IP lookup. Any failure here is a bootstrap
/// fault, not fatal: the node is still reachable by its local
/// addresses, just not necessarily from outside its LAN.
async fn discover_public_ip(ipify_url: &str) -> Option<String> {
    let resp = reqwest::get(ipify_url).await.ok()?;
    let text = resp.text().await.ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Registers with the first entrypoint that accepts us, then pulls its
/// whole-ledger snapshot so we start in sync with the network. An
/// empty or entirely unreachable entrypoint list just leaves the node
/// as the sole member so far.
async fn bootstrap(state: &SharedState, self_port: u16) {
    for entrypoint in &state.config.network.entrypoints {
        match state.peers.register(entrypoint, self_port).await {
            Ok(()) => {
                tracing::info!(entrypoint = %entrypoint, "registered with bootstrap peer");
                let sync_addr = match entrypoint_sync_addr(entrypoint) {
                    Some(addr) => addr,
                    None => continue,
                };
                match chain::sync::fetch_ledger(&sync_addr).await {
                    Ok(snapshot) => {
                        if let Err(e) = chain::sync::apply_snapshot(state.store.as_ref(), snapshot).await {
                            tracing::warn!(error = %e, "failed to apply fetched ledger snapshot");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to fetch ledger snapshot from bootstrap peer"),
                }
                return;
            }
            Err(e) => tracing::warn!(entrypoint = %entrypoint, error = %e, "bootstrap entrypoint unreachable"),
        }
    }
    tracing::info!("no reachable bootstrap entrypoint; proceeding solo");
}

/// Derives an entrypoint's ledger-sync `host:port` from its
/// `ws://host:port` control URL.
fn entrypoint_sync_addr(url: &str) -> Option<String> {
    let rest = url.strip_prefix("ws://").or_else(|| url.strip_prefix("wss://"))?;
    let (host, port) = rest.split_once(':')?;
    let port: u16 = port.trim_end_matches('/').parse().ok()?;
    Some(format!("{host}:{}", port + 1))
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
