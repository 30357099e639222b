//! Wire-level JSON request/response schema.
//!
//! One message per frame, `type` as the discriminator, matching the
//! external interface table exactly: `ping`, `balance`,
//! `send`/`receive`/`open`, `pendingSend`, `getPrevious`,
//! `registerNode`, `fetchNodes`, `watchForSends`, `vote`.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Block, BlockId, BlockType};
use crate::validation::error::RejectionReason;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "balance")]
    Balance { address: Address },
    #[serde(rename = "send")]
    Send {
        address: Address,
        id: BlockId,
        previous: BlockId,
        balance: Amount,
        link: String,
        signature: Option<String>,
    },
    #[serde(rename = "receive")]
    Receive {
        address: Address,
        id: BlockId,
        previous: BlockId,
        balance: Amount,
        link: String,
        signature: Option<String>,
    },
    #[serde(rename = "open")]
    Open {
        address: Address,
        id: BlockId,
        previous: BlockId,
        balance: Amount,
        link: String,
        signature: Option<String>,
    },
    #[serde(rename = "pendingSend")]
    PendingSend { address: Address },
    #[serde(rename = "getPrevious")]
    GetPrevious { address: Address },
    #[serde(rename = "registerNode")]
    RegisterNode { port: u16 },
    #[serde(rename = "fetchNodes")]
    FetchNodes,
    #[serde(rename = "watchForSends")]
    WatchForSends { address: Address },
    #[serde(rename = "vote")]
    Vote {
        #[serde(rename = "voteID")]
        vote_id: String,
        block: Block,
        address: Address,
        signature: String,
    },
}

impl Request {
    /// Reassembles a `send`/`receive`/`open` request's wire fields into
    /// a [`Block`], tagging it with the kind its frame `type` implied.
    /// `None` for every other request variant.
    pub fn into_block(self) -> Option<Block> {
        let (kind, address, id, previous, balance, link, signature) = match self {
            Request::Send {
                address,
                id,
                previous,
                balance,
                link,
                signature,
            } => (BlockType::Send, address, id, previous, balance, link, signature),
            Request::Receive {
                address,
                id,
                previous,
                balance,
                link,
                signature,
            } => (BlockType::Receive, address, id, previous, balance, link, signature),
            Request::Open {
                address,
                id,
                previous,
                balance,
                link,
                signature,
            } => (BlockType::Open, address, id, previous, balance, link, signature),
            _ => return None,
        };
        Some(Block {
            kind,
            address,
            id,
            previous,
            balance,
            link,
            signature,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "confirm")]
    Confirm {
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        nodes: Option<String>,
    },
    #[serde(rename = "info")]
    Info { address: Address, balance: Amount },
    #[serde(rename = "pendingSend")]
    PendingSend { link: String, #[serde(rename = "sendAmount")] send_amount: Amount },
    #[serde(rename = "previous")]
    Previous { address: Address, link: String },
    #[serde(rename = "sendAlert")]
    SendAlert {
        address: Address,
        #[serde(rename = "sendAmount")]
        send_amount: Amount,
        link: String,
    },
    #[serde(rename = "rejection")]
    Rejection {
        #[serde(skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        reason: RejectionReason,
    },
}

impl Response {
    pub fn confirm_ping() -> Self {
        Response::Confirm {
            action: Some("ping"),
            address: None,
            id: None,
            nodes: None,
        }
    }

    pub fn confirm_action(action: &'static str) -> Self {
        Response::Confirm {
            action: Some(action),
            address: None,
            id: None,
            nodes: None,
        }
    }

    pub fn confirm_block(address: Address, id: String) -> Self {
        Response::Confirm {
            action: None,
            address: Some(address),
            id: Some(id),
            nodes: None,
        }
    }

    /// Bare `{type:confirm}`, used for the `vote` ack.
    pub fn confirm_bare() -> Self {
        Response::Confirm {
            action: None,
            address: None,
            id: None,
            nodes: None,
        }
    }

    /// `{type:confirm, action:watchForSends, address}`
    pub fn confirm_watch(address: Address) -> Self {
        Response::Confirm {
            action: Some("watchForSends"),
            address: Some(address),
            id: None,
            nodes: None,
        }
    }

    /// `{type:confirm, action:fetchNodes, nodes:"|url1|url2…"}`
    pub fn confirm_fetch_nodes(urls: &[String]) -> Self {
        Response::Confirm {
            action: Some("fetchNodes"),
            address: None,
            id: None,
            nodes: Some(format!("|{}", urls.join("|"))),
        }
    }

    pub fn rejection(reason: RejectionReason) -> Self {
        Response::Rejection {
            address: None,
            id: None,
            reason,
        }
    }

    pub fn rejection_for(address: Address, id: String, reason: RejectionReason) -> Self {
        Response::Rejection {
            address: Some(address),
            id: Some(id),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_request_parses() {
        let req: Request = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(req, Request::Ping));
    }

    #[test]
    fn balance_request_parses() {
        let req: Request =
            serde_json::from_str(r#"{"type":"balance","address":"ABC"}"#).unwrap();
        match req {
            Request::Balance { address } => assert_eq!(address.as_str(), "ABC"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn confirm_ping_serializes_with_action() {
        let resp = Response::confirm_ping();
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"confirm","action":"ping"}"#);
    }

    #[test]
    fn fetch_nodes_response_pipe_delimits_urls() {
        let resp = Response::confirm_fetch_nodes(&["ws://a:1".into(), "ws://b:2".into()]);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(
            json,
            r#"{"type":"confirm","action":"fetchNodes","nodes":"|ws://a:1|ws://b:2"}"#
        );
    }

    #[test]
    fn rejection_serializes_reason() {
        let resp = Response::rejection(RejectionReason::Balance);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"rejection","reason":"balance"}"#);
    }
}
