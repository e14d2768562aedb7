use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use lanchat_core::{
    ConversationTarget, GatewayError, GatewayErrorCategory, GatewayEvent, LocalIdentity, Message,
    Peer,
};
use tokio::sync::broadcast;

use crate::gateway::{BackendGateway, GatewayCall};

const EVENT_BUFFER: usize = 256;

/// A message recorded by [`InMemoryGateway`] when the client sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: ConversationTarget,
    pub content: String,
}

#[derive(Debug, Default)]
struct FakeBackend {
    peers: BTreeMap<String, Peer>,
    history: Vec<Message>,
    identity: Option<LocalIdentity>,
    failures: HashMap<GatewayCall, VecDeque<GatewayError>>,
    calls: HashMap<GatewayCall, usize>,
    sent: Vec<SentMessage>,
}

/// Deterministic in-process backend for tests and demos.
///
/// Clones share the same state, so a test can keep one handle to script the
/// backend while the runtime owns another.
#[derive(Clone)]
pub struct InMemoryGateway {
    state: Arc<Mutex<FakeBackend>>,
    events: broadcast::Sender<GatewayEvent>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(Mutex::new(FakeBackend::default())),
            events,
        }
    }

    pub fn with_identity(self, peer_id: &str, display_name: &str) -> Self {
        if let Ok(mut state) = self.lock() {
            state.identity = Some(LocalIdentity {
                peer_id: peer_id.to_owned(),
                display_name: display_name.to_owned(),
            });
        }
        self
    }

    /// Replace the active peer snapshot.
    pub fn set_peers(&self, peers: impl IntoIterator<Item = Peer>) {
        if let Ok(mut state) = self.lock() {
            state.peers = peers
                .into_iter()
                .map(|peer| (peer.peer_id.clone(), peer))
                .collect();
        }
    }

    /// Append to the persisted history served by `get_message_history`.
    pub fn push_history(&self, messages: impl IntoIterator<Item = Message>) {
        if let Ok(mut state) = self.lock() {
            state.history.extend(messages);
        }
    }

    /// Fail the next invocation of `call` with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, call: GatewayCall, error: GatewayError) {
        if let Ok(mut state) = self.lock() {
            state.failures.entry(call).or_default().push_back(error);
        }
    }

    /// Push an event to every subscriber. Returns how many received it.
    pub fn emit(&self, event: GatewayEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Messages sent through the gateway so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().map(|state| state.sent.clone()).unwrap_or_default()
    }

    /// How often `call` was invoked, failures included.
    pub fn call_count(&self, call: GatewayCall) -> usize {
        self.lock()
            .map(|state| state.calls.get(&call).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FakeBackend>, GatewayError> {
        self.state.lock().map_err(|_| {
            GatewayError::new(
                GatewayErrorCategory::Internal,
                "poisoned_lock",
                "in-memory gateway state poisoned",
            )
        })
    }

    /// Count the call and pop a scripted failure, then run `body`.
    fn invoke<T>(
        &self,
        call: GatewayCall,
        body: impl FnOnce(&mut FakeBackend) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut state = self.lock()?;
        *state.calls.entry(call).or_default() += 1;
        if let Some(error) = state.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        body(&mut state)
    }
}

impl BackendGateway for InMemoryGateway {
    async fn greet(&self, name: &str) -> Result<String, GatewayError> {
        self.invoke(GatewayCall::Greet, |_| {
            Ok(format!("Hello {name}, It's show time!"))
        })
    }

    async fn send_message(&self, peer_id: &str, content: &str) -> Result<(), GatewayError> {
        self.invoke(GatewayCall::SendMessage, |state| {
            if !state.peers.contains_key(peer_id) {
                return Err(GatewayError::new(
                    GatewayErrorCategory::Network,
                    "peer_not_found",
                    format!("peer not found: {peer_id}"),
                ));
            }
            state.sent.push(SentMessage {
                target: ConversationTarget::Peer(peer_id.to_owned()),
                content: content.to_owned(),
            });
            Ok(())
        })
    }

    async fn broadcast_message(&self, content: &str) -> Result<(), GatewayError> {
        self.invoke(GatewayCall::BroadcastMessage, |state| {
            state.sent.push(SentMessage {
                target: ConversationTarget::Broadcast,
                content: content.to_owned(),
            });
            Ok(())
        })
    }

    async fn get_active_peers(&self) -> Result<BTreeMap<String, Peer>, GatewayError> {
        self.invoke(GatewayCall::GetActivePeers, |state| Ok(state.peers.clone()))
    }

    async fn get_local_peer_info(&self) -> Result<LocalIdentity, GatewayError> {
        self.invoke(GatewayCall::GetLocalPeerInfo, |state| {
            state
                .identity
                .clone()
                .ok_or_else(|| GatewayError::unavailable("network manager not initialized"))
        })
    }

    async fn get_message_history(
        &self,
        target: &ConversationTarget,
        limit: i64,
    ) -> Result<Vec<Message>, GatewayError> {
        self.invoke(GatewayCall::GetMessageHistory, |state| {
            let mut scoped: Vec<Message> = state
                .history
                .iter()
                .filter(|message| message.in_scope(target))
                .cloned()
                .collect();
            scoped.sort_by_key(|message| (message.timestamp_ms, message.id));
            let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
            let excess = scoped.len().saturating_sub(limit);
            Ok(scoped.split_off(excess))
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}
