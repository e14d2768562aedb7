use serde::{Deserialize, Serialize};

/// Wire literal some backends use instead of the empty string for broadcast.
pub const BROADCAST_SENTINEL: &str = "broadcast";

/// Network locator of a peer. Display/debug only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PeerAddress {
    /// Host or IP address as reported by discovery.
    pub host: String,
    /// TCP port the peer listens on, when known.
    pub port: Option<u16>,
}

impl PeerAddress {
    /// Render as `host:port` (or just `host` when the port is unknown).
    pub fn display(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }
}

/// One discovered participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peer {
    /// Opaque identity, immutable for the lifetime of the peer.
    pub peer_id: String,
    /// Human-readable label; may change when the peer re-announces.
    pub display_name: String,
    /// Network locator.
    pub address: PeerAddress,
    /// Most recent evidence of liveness, in milliseconds since Unix epoch.
    pub last_seen_ms: u64,
    /// Whether the peer is currently reported reachable.
    pub is_online: bool,
}

/// Conversation scope of a message, also used as the UI selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversationTarget {
    /// Direct exchange with one peer.
    Peer(String),
    /// The "all peers" conversation.
    Broadcast,
}

/// The UI's current conversation focus.
pub type Selection = ConversationTarget;

impl ConversationTarget {
    /// Parse the wire representation, where the empty string or
    /// [`BROADCAST_SENTINEL`] mean broadcast.
    pub fn from_wire(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == BROADCAST_SENTINEL {
            Self::Broadcast
        } else {
            Self::Peer(trimmed.to_owned())
        }
    }

    /// Wire representation accepted by history calls (`""` for broadcast).
    pub fn to_wire(&self) -> &str {
        match self {
            Self::Peer(peer_id) => peer_id,
            Self::Broadcast => "",
        }
    }

    /// Peer identity for direct targets.
    pub fn peer_id(&self) -> Option<&str> {
        match self {
            Self::Peer(peer_id) => Some(peer_id),
            Self::Broadcast => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }
}

/// One chat message, sent or received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Backend-assigned identifier, unique within the store.
    pub id: i64,
    /// Direct peer or broadcast.
    pub conversation_target: ConversationTarget,
    /// Originator identity (may equal the local identity).
    pub sender_id: String,
    /// Text payload.
    pub content: String,
    /// Send time in milliseconds since Unix epoch.
    pub timestamp_ms: u64,
    /// Whether the local user acknowledged the message.
    pub is_read: bool,
}

impl Message {
    /// Whether this message belongs to the history scope of `target`.
    ///
    /// Direct scopes cover both directions of the exchange; the broadcast
    /// scope only covers broadcast-targeted messages.
    pub fn in_scope(&self, target: &ConversationTarget) -> bool {
        match target {
            ConversationTarget::Peer(peer_id) => {
                self.conversation_target.peer_id() == Some(peer_id.as_str())
                    || self.sender_id == *peer_id
            }
            ConversationTarget::Broadcast => self.conversation_target.is_broadcast(),
        }
    }
}

/// Identifier of one notification occurrence.
pub type NotificationId = u64;

/// Ephemeral pop-up entry derived from an incoming message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    /// Source message.
    pub message_id: i64,
    /// Scope of the source message.
    pub conversation: ConversationTarget,
    /// Sender identity copied from the message.
    pub sender: String,
    /// Content, truncated to the display bound.
    pub content: String,
    /// Message timestamp in milliseconds since Unix epoch.
    pub timestamp_ms: u64,
    /// Local creation time, used for auto-expiry.
    pub created_at_ms: u64,
}

/// The running instance's own identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalIdentity {
    pub peer_id: String,
    pub display_name: String,
}

/// Validated push events delivered by the backend gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A peer announced itself (first time or again).
    PeerDiscovered(Peer),
    /// A peer stopped responding.
    PeerOffline {
        /// Identity of the departed peer.
        peer_id: String,
    },
    /// A message arrived (or was echoed back after sending).
    MessageReceived(Message),
    /// A message arrived before the backend persisted it, so it has no id.
    MessagePending(PendingMessage),
}

/// Live message without a backend id.
///
/// The session keeps it under a provisional id until a history load brings
/// in the persisted copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingMessage {
    pub conversation_target: ConversationTarget,
    pub sender_id: String,
    pub content: String,
    pub timestamp_ms: u64,
}

impl PendingMessage {
    /// Attach a provisional id.
    pub fn into_message(self, id: i64) -> Message {
        Message {
            id,
            conversation_target: self.conversation_target,
            sender_id: self.sender_id,
            content: self.content,
            timestamp_ms: self.timestamp_ms,
            is_read: false,
        }
    }

    /// History scope that will contain the persisted copy, seen from
    /// `local_id`.
    pub fn history_scope(&self, local_id: Option<&str>) -> ConversationTarget {
        match &self.conversation_target {
            ConversationTarget::Broadcast => ConversationTarget::Broadcast,
            ConversationTarget::Peer(peer_id) if Some(self.sender_id.as_str()) == local_id => {
                ConversationTarget::Peer(peer_id.clone())
            }
            ConversationTarget::Peer(_) => ConversationTarget::Peer(self.sender_id.clone()),
        }
    }
}

/// Single-entity directory update, stamped with its observation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Discovery carrying the announced record.
    Discovered(Peer),
    /// Offline notice observed at `at_ms`.
    Offline { peer_id: String, at_ms: u64 },
}

/// User-initiated actions whose failures surface to the UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserAction {
    SendMessage,
    BroadcastMessage,
    IdentityLookup,
    Greet,
}

/// Recoverable failure notice rendered by the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureNotice {
    pub action: UserAction,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether retrying may succeed.
    pub recoverable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(target: ConversationTarget, sender: &str) -> Message {
        Message {
            id: 1,
            conversation_target: target,
            sender_id: sender.to_owned(),
            content: "hi".to_owned(),
            timestamp_ms: 1_700_000_000_000,
            is_read: false,
        }
    }

    #[test]
    fn parses_broadcast_sentinels_from_wire() {
        assert_eq!(ConversationTarget::from_wire(""), ConversationTarget::Broadcast);
        assert_eq!(
            ConversationTarget::from_wire("broadcast"),
            ConversationTarget::Broadcast
        );
        assert_eq!(
            ConversationTarget::from_wire(" peer_1 "),
            ConversationTarget::Peer("peer_1".to_owned())
        );
        assert_eq!(ConversationTarget::Broadcast.to_wire(), "");
    }

    #[test]
    fn direct_scope_covers_both_directions() {
        let target = ConversationTarget::Peer("peer_b".to_owned());
        assert!(message(target.clone(), "local").in_scope(&target));
        assert!(message(ConversationTarget::Broadcast, "peer_b").in_scope(&target));
        assert!(!message(ConversationTarget::Broadcast, "peer_c").in_scope(&target));
    }

    #[test]
    fn broadcast_scope_only_covers_broadcast_messages() {
        let direct = message(ConversationTarget::Peer("peer_b".to_owned()), "local");
        assert!(!direct.in_scope(&ConversationTarget::Broadcast));
        assert!(
            message(ConversationTarget::Broadcast, "peer_c").in_scope(&ConversationTarget::Broadcast)
        );
    }

    #[test]
    fn pending_message_scope_points_at_the_remote_party() {
        let incoming = PendingMessage {
            conversation_target: ConversationTarget::Peer("local".to_owned()),
            sender_id: "peer_a".to_owned(),
            content: "hi".to_owned(),
            timestamp_ms: 1_000,
        };
        assert_eq!(
            incoming.history_scope(Some("local")),
            ConversationTarget::Peer("peer_a".to_owned())
        );

        let own = PendingMessage {
            conversation_target: ConversationTarget::Peer("peer_a".to_owned()),
            sender_id: "local".to_owned(),
            ..incoming.clone()
        };
        assert_eq!(
            own.history_scope(Some("local")),
            ConversationTarget::Peer("peer_a".to_owned())
        );

        let shout = PendingMessage {
            conversation_target: ConversationTarget::Broadcast,
            ..incoming
        };
        assert_eq!(shout.history_scope(None), ConversationTarget::Broadcast);
    }

    #[test]
    fn formats_address_with_optional_port() {
        let with_port = PeerAddress {
            host: "192.168.1.20".to_owned(),
            port: Some(8080),
        };
        let without_port = PeerAddress {
            host: "192.168.1.21".to_owned(),
            port: None,
        };
        assert_eq!(with_port.display(), "192.168.1.20:8080");
        assert_eq!(without_port.display(), "192.168.1.21");
    }
}
