use std::{collections::BTreeMap, future::Future};

use lanchat_core::{ConversationTarget, GatewayError, GatewayEvent, LocalIdentity, Message, Peer};
use tokio::sync::broadcast;

/// Call surface of the local backend host.
///
/// Every call is asynchronous and may fail with a [`GatewayError`]. Push
/// events are delivered to each [`BackendGateway::subscribe`] receiver.
pub trait BackendGateway: Send + Sync + 'static {
    /// Ask the backend for a greeting addressed to `name`.
    fn greet(&self, name: &str) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Send a direct message to `peer_id`.
    fn send_message(
        &self,
        peer_id: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Send a message to every peer.
    fn broadcast_message(
        &self,
        content: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Current `peer_id -> Peer` snapshot.
    fn get_active_peers(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<String, Peer>, GatewayError>> + Send;

    /// The running instance's identity.
    fn get_local_peer_info(
        &self,
    ) -> impl Future<Output = Result<LocalIdentity, GatewayError>> + Send;

    /// Up to `limit` most recent messages of `target`, oldest first.
    fn get_message_history(
        &self,
        target: &ConversationTarget,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Message>, GatewayError>> + Send;

    /// Attach a new push-event receiver.
    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent>;
}

/// Names of the gateway calls, as used on the wire and for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    Greet,
    SendMessage,
    BroadcastMessage,
    GetActivePeers,
    GetLocalPeerInfo,
    GetMessageHistory,
}

impl GatewayCall {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Greet => "Greet",
            Self::SendMessage => "SendMessage",
            Self::BroadcastMessage => "BroadcastMessage",
            Self::GetActivePeers => "GetActivePeers",
            Self::GetLocalPeerInfo => "GetLocalPeerInfo",
            Self::GetMessageHistory => "GetMessageHistory",
        }
    }
}
