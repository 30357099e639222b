//! WebSocket control channel: the external request router §6 describes.
//!
//! One message per frame, JSON, `type` as discriminator. A connection
//! may receive unsolicited pushes after a `watchForSends` subscription
//! (`sendAlert`), so replies and pushes share one outbound queue per
//! socket rather than a strict request/reply ping-pong.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use chain::{Request, Response};

use crate::state::SharedState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: SharedState, peer_addr: SocketAddr) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();

    let forward = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&response) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let response = match serde_json::from_str::<Request>(&text) {
            Ok(request) => dispatch(&state, request, peer_addr, &tx).await,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request frame");
                Response::rejection(chain::RejectionReason::UnknownRequest)
            }
        };
        if tx.send(response).is_err() {
            break;
        }
    }

    forward.abort();
}

async fn dispatch(
    state: &SharedState,
    request: Request,
    peer_addr: SocketAddr,
    tx: &mpsc::UnboundedSender<Response>,
) -> Response {
    match request {
        Request::RegisterNode { port } => {
            let url = format!("ws://{}:{}", peer_addr.ip(), port);
            state.peers.note_announced(url).await;
            Response::confirm_action("registerNode")
        }
        Request::FetchNodes => {
            let urls: Vec<String> = state.peers.known_urls().await.into_iter().collect();
            Response::confirm_fetch_nodes(&urls)
        }
        Request::WatchForSends { address } => {
            state.subscriptions.watch(address.clone(), tx.clone());
            Response::confirm_watch(address)
        }
        Request::Vote {
            vote_id,
            block,
            address,
            signature: _,
        } => {
            // The outer packet signature is intentionally not verified
            // here; only the enclosed block is independently validated
            // (see consensus::coordinator and DESIGN.md).
            if let Err(e) = state
                .coordinator
                .receive_vote(state.store.as_ref(), &vote_id, block, address, 1)
                .await
            {
                tracing::warn!(error = %e, "failed to tally vote");
            }
            Response::confirm_bare()
        }
        other => state.state_machine.handle(other).await,
    }
}
