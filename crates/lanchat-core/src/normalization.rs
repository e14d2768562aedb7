//! Validation of loosely-typed backend payloads into the closed record types
//! used by the core. Nothing untyped crosses this boundary.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::GatewayError,
    types::{
        ConversationTarget, FailureNotice, GatewayEvent, LocalIdentity, Message, Peer,
        PeerAddress, PendingMessage, UserAction,
    },
};

/// Push-event names emitted by the backend.
pub const EVENT_PEER_DISCOVERED: &str = "peerDiscovered";
pub const EVENT_PEER_OFFLINE: &str = "peerOffline";
pub const EVENT_MESSAGE_RECEIVED: &str = "messageReceived";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(String),
}

// Persisted peers use snake_case keys; discovery events carry the backend's
// untagged struct with PascalCase keys.
#[derive(Debug, Deserialize)]
struct WirePeer {
    #[serde(default, alias = "PeerID")]
    peer_id: String,
    #[serde(default, alias = "peer_name", alias = "Name")]
    name: String,
    #[serde(default, alias = "ip_address", alias = "IP")]
    ip: String,
    #[serde(default, alias = "Port")]
    port: Option<u16>,
    #[serde(default, alias = "LastSeen")]
    last_seen: Option<WireTimestamp>,
    #[serde(default, alias = "IsOnline")]
    is_online: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: Option<i64>,
    #[serde(default)]
    peer_id: String,
    sender_id: String,
    content: String,
    timestamp: WireTimestamp,
    #[serde(default)]
    is_read: bool,
}

#[derive(Debug, Deserialize)]
struct WireLocalPeerInfo {
    peer_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireOffline {
    Bare(String),
    Wrapped { peer_id: String },
}

/// Validate one peer record. An absent or unusable `last_seen` yields
/// `last_seen_ms == 0`.
pub fn peer_from_wire(value: Value) -> Result<Peer, GatewayError> {
    let wire: WirePeer =
        serde_json::from_value(value).map_err(|err| GatewayError::malformed("peer", err))?;
    let peer_id = wire.peer_id.trim().to_owned();
    if peer_id.is_empty() {
        return Err(GatewayError::malformed("peer", "empty peer_id"));
    }

    let last_seen_ms = match wire.last_seen {
        Some(timestamp) => epoch_ms(timestamp).unwrap_or_else(|err| {
            warn!(%peer_id, error = %err, "unusable peer last_seen; treating as epoch");
            0
        }),
        None => 0,
    };
    let display_name = if wire.name.trim().is_empty() {
        peer_id.clone()
    } else {
        wire.name.trim().to_owned()
    };

    Ok(Peer {
        display_name,
        address: PeerAddress {
            host: wire.ip,
            port: wire.port,
        },
        last_seen_ms,
        // Snapshot entries describe active peers unless they say otherwise.
        is_online: wire.is_online.unwrap_or(true),
        peer_id,
    })
}

/// Validate a peer snapshot, given either as a `peer_id -> record` object or
/// as an array. Malformed entries are skipped.
pub fn peers_from_wire(value: Value) -> Result<Vec<Peer>, GatewayError> {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Object(map) => map.into_iter().map(|(key, v)| (Some(key), v)).collect(),
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        other => {
            return Err(GatewayError::malformed(
                "peer snapshot",
                format!("expected object or array, got {}", json_kind(&other)),
            ));
        }
    };

    let mut peers = Vec::with_capacity(entries.len());
    for (key, mut raw) in entries {
        if let (Some(key), Value::Object(fields)) = (&key, &mut raw) {
            let present = ["peer_id", "PeerID"]
                .into_iter()
                .find(|name| fields.contains_key(*name));
            let missing_id = present
                .and_then(|name| fields.get(name))
                .and_then(Value::as_str)
                .is_none_or(|id| id.trim().is_empty());
            if missing_id {
                fields.insert(present.unwrap_or("peer_id").to_owned(), Value::String(key.clone()));
            }
        }
        match peer_from_wire(raw) {
            Ok(peer) => {
                if let Some(key) = &key
                    && *key != peer.peer_id
                {
                    warn!(%key, peer_id = %peer.peer_id, "snapshot key disagrees with peer_id");
                }
                peers.push(peer);
            }
            Err(err) => warn!(error = %err, "skipping malformed snapshot entry"),
        }
    }
    Ok(peers)
}

/// Validate one persisted message record. Records without an id are
/// rejected.
pub fn message_from_wire(value: Value) -> Result<Message, GatewayError> {
    let (id, body, is_read) = checked_message(value)?;
    let id = id.ok_or_else(|| GatewayError::malformed("message", "missing id"))?;
    let mut message = body.into_message(id);
    message.is_read = is_read;
    Ok(message)
}

/// Validate a pushed message. Live messages may precede persistence and
/// then arrive without an id.
pub fn live_message_from_wire(value: Value) -> Result<GatewayEvent, GatewayError> {
    let (id, body, is_read) = checked_message(value)?;
    Ok(match id {
        Some(id) => {
            let mut message = body.into_message(id);
            message.is_read = is_read;
            GatewayEvent::MessageReceived(message)
        }
        None => GatewayEvent::MessagePending(body),
    })
}

fn checked_message(value: Value) -> Result<(Option<i64>, PendingMessage, bool), GatewayError> {
    let wire: WireMessage =
        serde_json::from_value(value).map_err(|err| GatewayError::malformed("message", err))?;
    if wire.sender_id.trim().is_empty() {
        return Err(GatewayError::malformed("message", "empty sender_id"));
    }
    let timestamp_ms = epoch_ms(wire.timestamp)?;
    let body = PendingMessage {
        conversation_target: ConversationTarget::from_wire(&wire.peer_id),
        sender_id: wire.sender_id.trim().to_owned(),
        content: wire.content,
        timestamp_ms,
    };
    Ok((wire.id, body, wire.is_read))
}

/// Validate a history response. `null` (an empty result) yields no
/// messages; malformed entries are skipped.
pub fn messages_from_wire(value: Value) -> Result<Vec<Message>, GatewayError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(GatewayError::malformed(
                "message history",
                format!("expected array, got {}", json_kind(&other)),
            ));
        }
    };

    let mut messages = Vec::with_capacity(items.len());
    for raw in items {
        match message_from_wire(raw) {
            Ok(message) => messages.push(message),
            Err(err) => warn!(error = %err, "skipping malformed history entry"),
        }
    }
    Ok(messages)
}

/// Validate the local peer info response.
pub fn identity_from_wire(value: Value) -> Result<LocalIdentity, GatewayError> {
    let wire: WireLocalPeerInfo = serde_json::from_value(value)
        .map_err(|err| GatewayError::malformed("local peer info", err))?;
    let peer_id = wire.peer_id.trim().to_owned();
    if peer_id.is_empty() {
        return Err(GatewayError::malformed("local peer info", "empty peer_id"));
    }
    let display_name = match wire.name.trim() {
        "" => peer_id.clone(),
        name => name.to_owned(),
    };
    Ok(LocalIdentity {
        peer_id,
        display_name,
    })
}

/// Validate the greeting response.
pub fn greeting_from_wire(value: Value) -> Result<String, GatewayError> {
    match value {
        Value::String(greeting) => Ok(greeting),
        other => Err(GatewayError::malformed(
            "greeting",
            format!("expected string, got {}", json_kind(&other)),
        )),
    }
}

/// Validate one named push event.
pub fn event_from_wire(name: &str, payload: Value) -> Result<GatewayEvent, GatewayError> {
    match name {
        EVENT_PEER_DISCOVERED => peer_from_wire(payload).map(GatewayEvent::PeerDiscovered),
        EVENT_PEER_OFFLINE => {
            let wire: WireOffline = serde_json::from_value(payload)
                .map_err(|err| GatewayError::malformed("peerOffline payload", err))?;
            let peer_id = match wire {
                WireOffline::Bare(peer_id) | WireOffline::Wrapped { peer_id } => {
                    peer_id.trim().to_owned()
                }
            };
            if peer_id.is_empty() {
                return Err(GatewayError::malformed("peerOffline payload", "empty peer_id"));
            }
            Ok(GatewayEvent::PeerOffline { peer_id })
        }
        EVENT_MESSAGE_RECEIVED => live_message_from_wire(payload),
        other => Err(GatewayError::malformed(
            "event",
            format!("unknown event name '{other}'"),
        )),
    }
}

/// Turn the outcome of a user-initiated call into the notice the UI shows,
/// or `None` on success.
pub fn normalize_action_outcome(
    action: UserAction,
    outcome: Result<(), GatewayError>,
) -> Option<FailureNotice> {
    outcome.err().map(|error| error.into_notice(action))
}

fn epoch_ms(timestamp: WireTimestamp) -> Result<u64, GatewayError> {
    let millis = match timestamp {
        WireTimestamp::Millis(millis) => millis,
        WireTimestamp::Text(text) => text
            .parse::<DateTime<Utc>>()
            .map_err(|err| GatewayError::malformed("timestamp", format!("'{text}': {err}")))?
            .timestamp_millis(),
    };
    u64::try_from(millis)
        .map_err(|_| GatewayError::malformed("timestamp", format!("{millis} precedes the epoch")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
