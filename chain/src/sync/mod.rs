//! Whole-ledger snapshot transfer, used when a node joins the network.
//!
//! Wire format is plain newline-delimited text (not JSON), framed per
//! account: a `Account:{address}` marker line, one line per block
//! (that block's JSON encoding), then a lone `ayothatsall` sentinel
//! once every account has been streamed. Runs on `primaryPort + 1`.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::storage::BlockStore;
use crate::types::{Address, Block};

const SENTINEL: &str = "ayothatsall";

/// Serves the whole ledger to one connected client, then closes.
pub async fn serve_once(
    store: &dyn BlockStore,
    stream: &mut TcpStream,
) -> std::io::Result<()> {
    for address in store.accounts() {
        stream
            .write_all(format!("Account:{}\n", address.as_str()).as_bytes())
            .await?;
        for block in store.chain(&address) {
            let line = serde_json::to_string(&block)
                .unwrap_or_default();
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
        }
    }
    stream.write_all(format!("{SENTINEL}\n").as_bytes()).await?;
    stream.flush().await
}

/// Binds `bind_addr` (typically `0.0.0.0:{primaryPort+1}`) and serves
/// the ledger to every connecting client in turn, forever.
pub async fn run_server(
    store: std::sync::Arc<dyn BlockStore>,
    bind_addr: &str,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = bind_addr, "ledger sync server listening");
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_once(store.as_ref(), &mut stream).await {
                tracing::warn!(peer = %peer, error = %e, "ledger sync serve failed");
            }
        });
    }
}

/// Connects to `addr` (host's sync port) and pulls the whole ledger,
/// grouped by the last-seen `Account:` marker.
pub async fn fetch_ledger(
    addr: &str,
) -> std::io::Result<HashMap<Address, Vec<Block>>> {
    let stream = TcpStream::connect(addr).await?;
    let mut reader = BufReader::new(stream);
    let mut result: HashMap<Address, Vec<Block>> = HashMap::new();
    let mut current: Option<Address> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == SENTINEL {
            break;
        }
        if let Some(addr_str) = trimmed.strip_prefix("Account:") {
            let address = Address(addr_str.to_string());
            result.entry(address.clone()).or_default();
            current = Some(address);
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if let Some(address) = &current {
            match serde_json::from_str::<Block>(trimmed) {
                Ok(block) => {
                    result.entry(address.clone()).or_default().push(block);
                }
                Err(e) => tracing::warn!(error = %e, "malformed block line during sync"),
            }
        }
    }
    Ok(result)
}

/// Overwrites every local chain file with the fetched snapshot.
///
/// The fetched chain is written in the order received (the server
/// streams in forward chain order already, see
/// [`crate::storage::FileBlockStore::load_chain`]); this replaces
/// whatever was previously on disk for each account.
pub async fn apply_snapshot(
    store: &dyn BlockStore,
    snapshot: HashMap<Address, Vec<Block>>,
) -> Result<(), crate::storage::StorageError> {
    for (_, blocks) in snapshot {
        for block in blocks {
            store.append(block)?;
        }
    }
    Ok(())
}
