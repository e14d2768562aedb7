use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use lanchat_core::{
    ConversationTarget, GatewayError, GatewayErrorCategory, GatewayEvent, LocalIdentity, Message,
    Peer, normalization,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex as AsyncMutex, broadcast, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::gateway::{BackendGateway, GatewayCall};

const EVENT_BUFFER: usize = 512;

type ReplySender = oneshot::Sender<Result<Value, GatewayError>>;
type PendingCalls = Arc<Mutex<HashMap<u64, ReplySender>>>;

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    call: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Inbound {
    Reply {
        id: u64,
        #[serde(default)]
        ok: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Gateway speaking newline-delimited JSON to the backend host over TCP.
///
/// Replies are correlated to calls by id; everything else on the link is a
/// push event, validated before it reaches subscribers.
pub struct JsonLinesGateway {
    writer: AsyncMutex<OwnedWriteHalf>,
    pending: PendingCalls,
    next_id: AtomicU64,
    events: broadcast::Sender<GatewayEvent>,
    call_timeout: Duration,
    closed: CancellationToken,
}

impl JsonLinesGateway {
    /// Connect to the backend host and start reading the link.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        call_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let stream = TcpStream::connect(addr).await.map_err(|err| {
            GatewayError::new(
                GatewayErrorCategory::Network,
                "connect_failed",
                format!("backend connect failed: {err}"),
            )
        })?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "could not disable nagle on backend link");
        }
        Ok(Self::from_stream(stream, call_timeout))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, call_timeout: Duration) -> Self {
        let (read_half, write_half) = stream.into_split();
        let pending: PendingCalls = Arc::default();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let closed = CancellationToken::new();

        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&pending),
            events.clone(),
            closed.clone(),
        ));

        Self {
            writer: AsyncMutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
            events,
            call_timeout,
            closed,
        }
    }

    /// Whether the link has been closed by either side.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    async fn call(&self, call: GatewayCall, args: Value) -> Result<Value, GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::unavailable("backend link closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&Request {
            id,
            call: call.wire_name(),
            args,
        })
        .map_err(|err| {
            GatewayError::new(
                GatewayErrorCategory::Serialization,
                "request_encode_failed",
                err.to_string(),
            )
        })?;
        line.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.register(id, reply_tx)?;
        trace!(id, call = call.wire_name(), "gateway call issued");

        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(err) => Err(err),
            }
        };
        if let Err(err) = written {
            self.forget(id);
            return Err(GatewayError::new(
                GatewayErrorCategory::Network,
                "write_failed",
                format!("backend write failed: {err}"),
            ));
        }

        match tokio::time::timeout(self.call_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::unavailable("backend link closed")),
            Err(_) => {
                self.forget(id);
                warn!(id, call = call.wire_name(), "gateway call timed out");
                Err(GatewayError::new(
                    GatewayErrorCategory::Timeout,
                    "call_timeout",
                    format!(
                        "{} did not complete within {} ms",
                        call.wire_name(),
                        self.call_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    // The reader cancels `closed` before draining `pending`, so a call
    // registered after the drain sees the cancellation here.
    fn register(&self, id: u64, reply_tx: ReplySender) -> Result<(), GatewayError> {
        self.pending
            .lock()
            .map_err(|_| poisoned())?
            .insert(id, reply_tx);
        if self.is_closed() {
            self.forget(id);
            return Err(GatewayError::unavailable("backend link closed"));
        }
        Ok(())
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

impl Drop for JsonLinesGateway {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

impl BackendGateway for JsonLinesGateway {
    async fn greet(&self, name: &str) -> Result<String, GatewayError> {
        let value = self.call(GatewayCall::Greet, json!({ "name": name })).await?;
        normalization::greeting_from_wire(value)
    }

    async fn send_message(&self, peer_id: &str, content: &str) -> Result<(), GatewayError> {
        self.call(
            GatewayCall::SendMessage,
            json!({ "peer_id": peer_id, "content": content }),
        )
        .await
        .map(|_| ())
    }

    async fn broadcast_message(&self, content: &str) -> Result<(), GatewayError> {
        self.call(GatewayCall::BroadcastMessage, json!({ "content": content }))
            .await
            .map(|_| ())
    }

    async fn get_active_peers(&self) -> Result<BTreeMap<String, Peer>, GatewayError> {
        let value = self.call(GatewayCall::GetActivePeers, json!({})).await?;
        Ok(normalization::peers_from_wire(value)?
            .into_iter()
            .map(|peer| (peer.peer_id.clone(), peer))
            .collect())
    }

    async fn get_local_peer_info(&self) -> Result<LocalIdentity, GatewayError> {
        let value = self.call(GatewayCall::GetLocalPeerInfo, json!({})).await?;
        normalization::identity_from_wire(value)
    }

    async fn get_message_history(
        &self,
        target: &ConversationTarget,
        limit: i64,
    ) -> Result<Vec<Message>, GatewayError> {
        let value = self
            .call(
                GatewayCall::GetMessageHistory,
                json!({ "peer_id": target.to_wire(), "limit": limit }),
            )
            .await?;
        normalization::messages_from_wire(value)
    }

    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    pending: PendingCalls,
    events: broadcast::Sender<GatewayEvent>,
    closed: CancellationToken,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatch_line(&line, &pending, &events),
                Ok(None) => {
                    info!("backend closed the link");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "backend link read failed");
                    break;
                }
            },
        }
    }

    closed.cancel();
    let orphaned: Vec<ReplySender> = match pending.lock() {
        Ok(mut pending) => pending.drain().map(|(_, reply_tx)| reply_tx).collect(),
        Err(_) => Vec::new(),
    };
    if !orphaned.is_empty() {
        debug!(count = orphaned.len(), "failing calls pending on closed link");
    }
    for reply_tx in orphaned {
        let _ = reply_tx.send(Err(GatewayError::unavailable("backend link closed")));
    }
}

fn dispatch_line(line: &str, pending: &PendingCalls, events: &broadcast::Sender<GatewayEvent>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let inbound: Inbound = match serde_json::from_str(line) {
        Ok(inbound) => inbound,
        Err(err) => {
            warn!(error = %err, "dropping malformed line from backend");
            return;
        }
    };

    match inbound {
        Inbound::Reply { id, ok, error } => {
            let reply_tx = match pending.lock() {
                Ok(mut pending) => pending.remove(&id),
                Err(_) => None,
            };
            let Some(reply_tx) = reply_tx else {
                debug!(id, "reply for unknown or expired call");
                return;
            };
            let result = match error {
                Some(text) => Err(backend_error(text)),
                None => Ok(ok.unwrap_or(Value::Null)),
            };
            let _ = reply_tx.send(result);
        }
        Inbound::Event { name, payload } => match normalization::event_from_wire(&name, payload) {
            Ok(event) => {
                trace!(%name, "push event received");
                let _ = events.send(event);
            }
            Err(err) => warn!(%name, error = %err, "dropping malformed push event"),
        },
    }
}

fn backend_error(text: String) -> GatewayError {
    if text.contains("not initialized") {
        GatewayError::unavailable(text)
    } else {
        GatewayError::new(GatewayErrorCategory::Network, "backend_error", text)
    }
}

fn poisoned() -> GatewayError {
    GatewayError::new(
        GatewayErrorCategory::Internal,
        "poisoned_lock",
        "pending call table poisoned",
    )
}
