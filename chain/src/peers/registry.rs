//! Peer table and transitive gossip discovery.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{Request, Response};
use crate::types::Peer;

/// An open, request/response-capable connection to one peer.
///
/// Boxed futures rather than `async fn` in the trait, since this type
/// is used as a trait object (`Arc<dyn PeerLink>`) and `async fn` in
/// traits is not yet dyn-compatible.
pub trait PeerLink: Send + Sync {
    fn ping(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
    fn request(
        &self,
        req: Request,
    ) -> Pin<Box<dyn Future<Output = Option<Response>> + Send + '_>>;
}

/// A [`PeerLink`] backed by an outbound `tokio-tungstenite` WebSocket
/// connection. Requests and responses are newline-free JSON text
/// frames, one per round trip — the protocol has no pipelining.
pub struct WsPeerLink {
    socket: Mutex<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>>,
}

impl WsPeerLink {
    pub async fn connect(url: &str) -> Result<Self, tokio_tungstenite::tungstenite::Error> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(WsPeerLink {
            socket: Mutex::new(socket),
        })
    }

    async fn roundtrip(&self, req: &Request, timeout: Duration) -> Option<Response> {
        let body = serde_json::to_string(req).ok()?;
        let mut socket = self.socket.lock().await;
        socket.send(Message::Text(body.into())).await.ok()?;
        let reply = tokio::time::timeout(timeout, socket.next()).await.ok()??.ok()?;
        match reply {
            Message::Text(text) => serde_json::from_str(&text).ok(),
            _ => None,
        }
    }
}

impl PeerLink for WsPeerLink {
    fn ping(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            matches!(
                self.roundtrip(&Request::Ping, Duration::from_secs(3)).await,
                Some(Response::Confirm { .. })
            )
        })
    }

    fn request(
        &self,
        req: Request,
    ) -> Pin<Box<dyn Future<Output = Option<Response>> + Send + '_>> {
        Box::pin(async move { self.roundtrip(&req, Duration::from_secs(5)).await })
    }
}

struct Entry {
    peer: Peer,
    /// `None` for peers we only know about because they announced
    /// themselves to us via an inbound `registerNode` — we haven't
    /// dialed them back, so there's nothing to route votes through yet.
    link: Option<Arc<dyn PeerLink>>,
}

/// The node's peer table: `url -> (metadata, live connection)`.
///
/// Per spec §4.6/§5, all outbound peer traffic is required to route
/// through the registry rather than dialing sockets ad hoc, so other
/// components never hold a raw connection across a suspension point.
pub struct PeerRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    self_urls: HashSet<String>,
}

impl PeerRegistry {
    /// `self_urls` is every address this node is reachable at
    /// (`localhost`, `127.0.0.1`, and its resolved public IP, each
    /// combined with its listening port) — used for self-detection
    /// during discovery.
    pub fn new(self_urls: HashSet<String>) -> Self {
        PeerRegistry {
            entries: RwLock::new(HashMap::new()),
            self_urls,
        }
    }

    pub async fn live_peers(&self) -> Vec<Peer> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.peer.live)
            .map(|e| e.peer.clone())
            .collect()
    }

    pub async fn known_urls(&self) -> HashSet<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn get_link(&self, url: &str) -> Option<Arc<dyn PeerLink>> {
        self.entries.read().await.get(url).and_then(|e| e.link.clone())
    }

    fn is_self(&self, url: &str) -> bool {
        self.self_urls.contains(url)
    }

    /// Records a peer that announced itself to us via an inbound
    /// `registerNode`, without dialing it back. Used so `fetchNodes`
    /// can surface it to the next joiner even before we independently
    /// confirm it's reachable.
    pub async fn note_announced(&self, url: String) {
        if self.is_self(&url) {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.entry(url.clone()).or_insert_with(|| Entry {
            peer: Peer::new(url),
            link: None,
        });
    }

    /// Registers one peer and recursively discovers, and registers,
    /// every peer transitively reachable from it.
    ///
    /// Mirrors the original handshake: `registerNode` to announce
    /// ourselves, then `fetchNodes` to walk the gossip graph, skipping
    /// URLs that are already known or resolve to this node itself.
    pub async fn register(&self, url: &str, self_port: u16) -> Result<(), String> {
        if self.is_self(url) || self.entries.read().await.contains_key(url) {
            return Ok(());
        }

        let link: Arc<dyn PeerLink> = Arc::new(
            WsPeerLink::connect(url)
                .await
                .map_err(|e| format!("connect to {url} failed: {e}"))?,
        );

        let ack = link
            .request(Request::RegisterNode { port: self_port })
            .await;
        if !matches!(ack, Some(Response::Confirm { .. })) {
            return Err(format!("{url} rejected registerNode"));
        }

        self.entries.write().await.insert(
            url.to_string(),
            Entry {
                peer: Peer::new(url.to_string()),
                link: Some(link.clone()),
            },
        );
        tracing::info!(peer = url, "registered peer");

        let discovered = link.request(Request::FetchNodes).await;
        let Some(Response::Confirm {
            nodes: Some(list), ..
        }) = discovered
        else {
            return Ok(());
        };

        for peer_url in list.split('|').filter(|s| !s.is_empty()) {
            if self.is_self(peer_url) || self.entries.read().await.contains_key(peer_url) {
                continue;
            }
            // Discovery failures for a transitively-reached peer are not
            // fatal to the registration that found them.
            if let Err(e) = Box::pin(self.register(peer_url, self_port)).await {
                tracing::warn!(peer = peer_url, error = %e, "transitive peer registration failed");
            }
        }
        Ok(())
    }

    /// Marks every peer's liveness by `ping`ing it; returns the live set.
    pub async fn refresh_liveness(&self) -> Vec<Peer> {
        let urls: Vec<String> = self.entries.read().await.keys().cloned().collect();
        for url in urls {
            let link = self.entries.read().await.get(&url).and_then(|e| e.link.clone());
            let Some(link) = link else { continue };
            let live = tokio::time::timeout(Duration::from_secs(3), link.ping())
                .await
                .unwrap_or(false);
            if let Some(entry) = self.entries.write().await.get_mut(&url) {
                entry.peer.live = live;
            }
        }
        self.live_peers().await
    }
}
