//! Session runtime: one task owns the [`ChatSession`], issues gateway calls
//! as spawned futures and folds their completions, user commands and push
//! events into the session.

use std::{
    collections::BTreeMap,
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use lanchat_core::{
    ChangeStream, ChatSession, ConversationTarget, GatewayError, GatewayEvent, LocalIdentity,
    Message, NotificationId, Peer, RetryPolicy, SessionAction, SessionChannelError,
    SessionChannels, SessionCommand, SessionConfig, SessionSnapshot, StoreChange, UserAction,
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::gateway::BackendGateway;

/// Receives a fresh snapshot whenever the session changed.
pub type SnapshotCallback = Arc<dyn Fn(SessionSnapshot) + Send + Sync + 'static>;

/// Runtime tunables on top of [`SessionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub session: SessionConfig,
    /// Period of the active-peers poll.
    pub poll_interval: Duration,
    /// Period of notification expiry and offline purge.
    pub housekeeping_interval: Duration,
    /// Backoff for the startup identity lookup.
    pub identity_retry: RetryPolicy,
    pub command_buffer: usize,
    pub change_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            poll_interval: Duration::from_secs(5),
            housekeeping_interval: Duration::from_secs(1),
            identity_retry: RetryPolicy::default(),
            command_buffer: 64,
            change_buffer: 256,
        }
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    channels: SessionChannels,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionChannelError> {
        self.channels.send_command(command).await
    }

    /// Non-async variant for UI callbacks.
    pub fn try_send(&self, command: SessionCommand) -> Result<(), SessionChannelError> {
        self.channels.try_send_command(command)
    }

    pub fn subscribe(&self) -> ChangeStream {
        self.channels.subscribe()
    }

    pub fn channels(&self) -> SessionChannels {
        self.channels.clone()
    }

    /// Stop polling and discard in-flight completions.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the runtime task to finish.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            warn!(error = %err, "session runtime task failed");
        }
    }
}

/// Spawn the session runtime on the current tokio runtime and issue the
/// initial identity, peer and history loads.
pub fn spawn_session<G: BackendGateway>(
    gateway: Arc<G>,
    config: RuntimeConfig,
    on_snapshot: Option<SnapshotCallback>,
) -> SessionHandle {
    let (channels, command_rx) = SessionChannels::new(config.command_buffer, config.change_buffer);
    let cancel = CancellationToken::new();
    let runtime = SessionRuntime::new(
        gateway,
        config,
        &channels,
        command_rx,
        cancel.clone(),
        on_snapshot,
    );
    info!(
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        history_limit = config.session.history_limit,
        "spawning session runtime"
    );
    let task = tokio::spawn(runtime.run());

    SessionHandle {
        channels,
        cancel,
        task,
    }
}

#[derive(Debug)]
enum Completion {
    Identity(Result<LocalIdentity, GatewayError>),
    Peers(Result<BTreeMap<String, Peer>, GatewayError>),
    History {
        target: ConversationTarget,
        result: Result<Vec<Message>, GatewayError>,
    },
    Action {
        action: UserAction,
        result: Result<(), GatewayError>,
    },
    Greeting(Result<String, GatewayError>),
}

struct SessionRuntime<G> {
    gateway: Arc<G>,
    session: ChatSession,
    config: RuntimeConfig,
    command_rx: mpsc::Receiver<SessionCommand>,
    change_rx: broadcast::Receiver<StoreChange>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Receiver<GatewayEvent>,
    events_open: bool,
    poll_in_flight: bool,
    cancel: CancellationToken,
    on_snapshot: Option<SnapshotCallback>,
}

impl<G: BackendGateway> SessionRuntime<G> {
    fn new(
        gateway: Arc<G>,
        config: RuntimeConfig,
        channels: &SessionChannels,
        command_rx: mpsc::Receiver<SessionCommand>,
        cancel: CancellationToken,
        on_snapshot: Option<SnapshotCallback>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let events = gateway.subscribe();
        Self {
            session: ChatSession::new(config.session).with_change_sender(channels.change_sender()),
            change_rx: channels.subscribe(),
            gateway,
            config,
            command_rx,
            completion_tx,
            completion_rx,
            events,
            events_open: true,
            poll_in_flight: false,
            cancel,
            on_snapshot,
        }
    }

    async fn run(mut self) {
        self.start();
        self.publish_if_changed();

        let now = Instant::now();
        let mut poll = interval_at(now + self.config.poll_interval, self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut housekeeping = interval_at(
            now + self.config.housekeeping_interval,
            self.config.housekeeping_interval,
        );
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(completion) = self.completion_rx.recv() => self.apply_completion(completion),
                command = self.command_rx.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.events.recv(), if self.events_open => self.handle_event(event),
                _ = poll.tick() => self.request_peers(),
                _ = housekeeping.tick() => self.housekeeping(),
            }
            self.publish_if_changed();
        }

        // Spawned calls observe the cancelled token; anything already queued
        // is dropped with the receiver.
        self.cancel.cancel();
        self.session.shutdown();
        self.publish_if_changed();
        debug!("session runtime stopped");
    }

    fn start(&mut self) {
        if let Err(err) = self.session.begin_start() {
            warn!(error = %err, "session start rejected");
            return;
        }
        self.request_identity();
        self.request_peers();
        let selection = self.session.selection().clone();
        self.request_history(selection);
    }

    fn handle_command(&mut self, command: SessionCommand) {
        trace!(command = command_kind(&command), "session command");
        match command {
            SessionCommand::Select(selection) => {
                if self.session.select(selection.clone()) {
                    self.request_history(selection);
                }
            }
            SessionCommand::SendMessage { peer_id, content } => {
                self.request_send(UserAction::SendMessage, Some(peer_id), content);
            }
            SessionCommand::BroadcastMessage { content } => {
                self.request_send(UserAction::BroadcastMessage, None, content);
            }
            SessionCommand::DismissNotification(id) => self.dismiss(id),
            SessionCommand::MarkSelectionRead => {
                self.session.mark_selection_read();
            }
            SessionCommand::RefreshPeers => self.request_peers(),
            SessionCommand::ReloadHistory => {
                let selection = self.session.selection().clone();
                self.request_history(selection);
            }
            SessionCommand::Greet { name } => self.request_greeting(name),
            SessionCommand::Shutdown => self.cancel.cancel(),
        }
    }

    fn handle_event(&mut self, event: Result<GatewayEvent, broadcast::error::RecvError>) {
        match event {
            Ok(event) => {
                let reload = match &event {
                    GatewayEvent::MessagePending(pending) => Some(self.session.pending_scope(pending)),
                    _ => None,
                };
                if let Some(notification) = self.session.on_event(event, unix_now_ms()) {
                    debug!(
                        notification_id = notification.id,
                        sender = %notification.sender,
                        "notification raised"
                    );
                }
                if let Some(target) = reload {
                    self.request_history(target);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "push events lagged; refreshing peers and history");
                self.request_peers();
                let selection = self.session.selection().clone();
                if !selection.is_broadcast() {
                    self.request_history(ConversationTarget::Broadcast);
                }
                self.request_history(selection);
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("push event stream closed; relying on polling");
                self.events_open = false;
            }
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Identity(result) => {
                self.session.on_identity_loaded(result);
            }
            Completion::Peers(result) => {
                self.poll_in_flight = false;
                self.session
                    .on_peer_snapshot(result.map(|peers| peers.into_values().collect()));
            }
            Completion::History { target, result } => {
                let window = self.session.on_history_loaded(&target, result);
                trace!(?target, loaded = window.len(), "history applied");
            }
            Completion::Action { action, result } => self.session.on_action_result(action, result),
            Completion::Greeting(result) => self.session.on_greeting(result),
        }
    }

    fn housekeeping(&mut self) {
        let now_ms = unix_now_ms();
        self.session.expire_notifications(now_ms);
        self.session.purge_departed(now_ms);
    }

    fn dismiss(&mut self, id: NotificationId) {
        if !self.session.dismiss_notification(id) {
            trace!(id, "dismiss for unknown notification");
        }
    }

    fn request_identity(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let policy = self.config.identity_retry;
        self.spawn_call(async move {
            let mut failures = 0_u32;
            loop {
                match gateway.get_local_peer_info().await {
                    Ok(identity) => return Completion::Identity(Ok(identity)),
                    Err(err) => {
                        failures = failures.saturating_add(1);
                        let Some(delay) = policy.next_delay(failures, &err) else {
                            return Completion::Identity(Err(err));
                        };
                        warn!(
                            attempt = failures,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "identity lookup failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        });
    }

    fn request_peers(&mut self) {
        if self.poll_in_flight {
            trace!("peer poll already in flight");
            return;
        }
        if let Err(err) = self.session.check_call(SessionAction::Refresh) {
            debug!(error = %err, "peer poll skipped");
            return;
        }
        self.poll_in_flight = true;
        let gateway = Arc::clone(&self.gateway);
        self.spawn_call(async move { Completion::Peers(gateway.get_active_peers().await) });
    }

    fn request_history(&mut self, target: ConversationTarget) {
        let limit = self.config.session.history_limit;
        if limit <= 0 {
            trace!(?target, "history disabled");
            return;
        }
        if let Err(err) = self.session.check_call(SessionAction::Refresh) {
            debug!(error = %err, "history load skipped");
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn_call(async move {
            let result = gateway.get_message_history(&target, limit).await;
            Completion::History { target, result }
        });
    }

    fn request_send(&mut self, action: UserAction, peer_id: Option<String>, content: String) {
        if content.trim().is_empty() {
            debug!(?action, "ignoring empty message");
            return;
        }
        if let Err(err) = self.session.check_call(SessionAction::UserCall) {
            self.session.on_action_result(action, Err(err));
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn_call(async move {
            let result = match peer_id {
                Some(peer_id) => gateway.send_message(&peer_id, &content).await,
                None => gateway.broadcast_message(&content).await,
            };
            Completion::Action { action, result }
        });
    }

    fn request_greeting(&mut self, name: String) {
        if let Err(err) = self.session.check_call(SessionAction::UserCall) {
            self.session.on_greeting(Err(err));
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn_call(async move { Completion::Greeting(gateway.greet(&name).await) });
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completion_tx = self.completion_tx.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => trace!("gateway call abandoned at shutdown"),
                completion = call => {
                    if completion_tx.send(completion).is_err() {
                        trace!("completion discarded; runtime stopped");
                    }
                }
            }
        });
    }

    fn publish_if_changed(&mut self) {
        let mut changed = false;
        loop {
            match self.change_rx.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
                Err(_) => break,
            }
        }
        if !changed {
            return;
        }
        if let Some(on_snapshot) = &self.on_snapshot {
            let snapshot = self.session.snapshot();
            trace!(
                peers = snapshot.peers.len(),
                messages = snapshot.messages.len(),
                notifications = snapshot.notifications.len(),
                "publishing snapshot"
            );
            on_snapshot(snapshot);
        }
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

fn command_kind(command: &SessionCommand) -> &'static str {
    match command {
        SessionCommand::Select(_) => "Select",
        SessionCommand::SendMessage { .. } => "SendMessage",
        SessionCommand::BroadcastMessage { .. } => "BroadcastMessage",
        SessionCommand::DismissNotification(_) => "DismissNotification",
        SessionCommand::MarkSelectionRead => "MarkSelectionRead",
        SessionCommand::RefreshPeers => "RefreshPeers",
        SessionCommand::ReloadHistory => "ReloadHistory",
        SessionCommand::Greet { .. } => "Greet",
        SessionCommand::Shutdown => "Shutdown",
    }
}

#[cfg(test)]
mod tests {
    use lanchat_core::{PeerAddress, PendingMessage, SessionLifecycleState, Selection};
    use tokio::time::timeout;

    use super::*;
    use crate::{gateway::GatewayCall, in_memory::InMemoryGateway};

    fn peer(peer_id: &str, name: &str) -> Peer {
        Peer {
            peer_id: peer_id.to_owned(),
            display_name: name.to_owned(),
            address: PeerAddress {
                host: "192.168.1.50".to_owned(),
                port: Some(8080),
            },
            last_seen_ms: 1_000,
            is_online: true,
        }
    }

    fn message(id: i64, target: ConversationTarget, sender: &str) -> Message {
        Message {
            id,
            conversation_target: target,
            sender_id: sender.to_owned(),
            content: format!("message {id}"),
            timestamp_ms: 1_700_000_000_000 + id as u64,
            is_read: false,
        }
    }

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            poll_interval: Duration::from_millis(20),
            housekeeping_interval: Duration::from_millis(20),
            identity_retry: RetryPolicy::new(5, 20, 3),
            ..RuntimeConfig::default()
        }
    }

    fn spawn_with_snapshots(
        gateway: &InMemoryGateway,
        config: RuntimeConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionSnapshot>) {
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let callback: SnapshotCallback = Arc::new(move |snapshot: SessionSnapshot| {
            let _ = snapshot_tx.send(snapshot);
        });
        let handle = spawn_session(Arc::new(gateway.clone()), config, Some(callback));
        (handle, snapshot_rx)
    }

    async fn wait_for<F>(
        snapshots: &mut mpsc::UnboundedReceiver<SessionSnapshot>,
        mut predicate: F,
    ) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = snapshots.recv().await.expect("runtime publishes snapshots");
                if predicate(&snapshot) {
                    return snapshot;
                }
            }
        })
        .await
        .expect("snapshot condition not reached in time")
    }

    #[tokio::test]
    async fn startup_loads_identity_peers_and_history() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob")]);
        gateway.push_history([message(1, ConversationTarget::Broadcast, "peer_b")]);

        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());
        let snapshot = wait_for(&mut snapshots, |s| {
            s.lifecycle == SessionLifecycleState::Live
                && s.identity_label == "Me"
                && s.messages.len() == 1
        })
        .await;
        assert_eq!(snapshot.peers[0].display_name, "Bob");

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn push_events_merge_and_raise_notifications() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob"), peer("peer_c", "Carol")]);
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());
        wait_for(&mut snapshots, |s| {
            s.lifecycle == SessionLifecycleState::Live && s.identity_label == "Me"
        })
        .await;

        handle
            .send(SessionCommand::Select(Selection::Peer("peer_b".into())))
            .await
            .expect("select");
        wait_for(&mut snapshots, |s| s.selection == Selection::Peer("peer_b".into())).await;

        gateway.emit(GatewayEvent::MessageReceived(message(
            10,
            ConversationTarget::Peer("local".into()),
            "peer_c",
        )));
        let snapshot = wait_for(&mut snapshots, |s| !s.notifications.is_empty()).await;
        assert_eq!(snapshot.notifications[0].sender, "peer_c");

        let id = snapshot.notifications[0].id;
        handle
            .send(SessionCommand::DismissNotification(id))
            .await
            .expect("dismiss");
        wait_for(&mut snapshots, |s| s.notifications.is_empty()).await;

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn lagged_event_stream_recovers_messages_from_history() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob")]);
        let mut config = test_config();
        config.session.history_limit = 1_000;
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, config);
        wait_for(&mut snapshots, |s| {
            s.lifecycle == SessionLifecycleState::Live && s.identity_label == "Me"
        })
        .await;
        timeout(Duration::from_secs(2), async {
            while gateway.call_count(GatewayCall::GetMessageHistory) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("startup history load issued");
        let history_calls = gateway.call_count(GatewayCall::GetMessageHistory);

        let burst: Vec<Message> = (1..=300)
            .map(|id| message(id, ConversationTarget::Broadcast, "peer_b"))
            .collect();
        gateway.push_history(burst.clone());
        for message in burst {
            gateway.emit(GatewayEvent::MessageReceived(message));
        }

        let snapshot = wait_for(&mut snapshots, |s| s.messages.len() == 300).await;
        assert_eq!(snapshot.messages[0].message_id, 1);
        assert!(gateway.call_count(GatewayCall::GetMessageHistory) > history_calls);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn pending_message_is_replaced_by_persisted_copy() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob")]);
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());
        wait_for(&mut snapshots, |s| {
            s.lifecycle == SessionLifecycleState::Live && s.identity_label == "Me"
        })
        .await;

        let mut persisted = message(41, ConversationTarget::Broadcast, "peer_b");
        gateway.push_history([persisted.clone()]);
        persisted.timestamp_ms -= 200;
        gateway.emit(GatewayEvent::MessagePending(PendingMessage {
            conversation_target: ConversationTarget::Broadcast,
            sender_id: persisted.sender_id,
            content: persisted.content,
            timestamp_ms: persisted.timestamp_ms,
        }));

        let snapshot = wait_for(&mut snapshots, |s| {
            s.messages.len() == 1 && s.messages[0].message_id == 41
        })
        .await;
        assert_eq!(snapshot.messages[0].sender_label, "Bob");

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn poll_failure_keeps_prior_directory() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob")]);
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());
        wait_for(&mut snapshots, |s| s.peers.len() == 1).await;

        gateway.fail_next(GatewayCall::GetActivePeers, GatewayError::unavailable("blip"));
        gateway.set_peers([peer("peer_b", "Bob"), peer("peer_c", "Carol")]);
        let snapshot = wait_for(&mut snapshots, |s| s.peers.len() == 2).await;
        assert!(snapshot.failure.is_none());
        assert!(gateway.call_count(GatewayCall::GetActivePeers) >= 3);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn identity_lookup_retries_before_giving_up() {
        let gateway = InMemoryGateway::new();
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());

        let snapshot = wait_for(&mut snapshots, |s| s.failure.is_some()).await;
        let notice = snapshot.failure.expect("identity failure notice");
        assert_eq!(notice.action, UserAction::IdentityLookup);
        assert_eq!(snapshot.identity_label, "Unknown identity");
        assert_eq!(gateway.call_count(GatewayCall::GetLocalPeerInfo), 4);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn send_failures_surface_as_notice() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob")]);
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());
        wait_for(&mut snapshots, |s| s.lifecycle == SessionLifecycleState::Live).await;

        handle
            .send(SessionCommand::SendMessage {
                peer_id: "ghost".into(),
                content: "hello?".into(),
            })
            .await
            .expect("send");
        let snapshot = wait_for(&mut snapshots, |s| s.failure.is_some()).await;
        assert_eq!(
            snapshot.failure.map(|notice| notice.code),
            Some("peer_not_found".to_owned())
        );

        handle
            .send(SessionCommand::BroadcastMessage {
                content: "hi all".into(),
            })
            .await
            .expect("broadcast");
        handle
            .send(SessionCommand::Greet { name: "Ann".into() })
            .await
            .expect("greet");
        wait_for(&mut snapshots, |s| s.greeting.is_some()).await;
        assert_eq!(gateway.sent().len(), 1);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn shutdown_stops_runtime_and_discards_late_events() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b", "Bob")]);
        let (handle, mut snapshots) = spawn_with_snapshots(&gateway, test_config());
        wait_for(&mut snapshots, |s| s.lifecycle == SessionLifecycleState::Live).await;

        let channels = handle.channels();
        handle
            .send(SessionCommand::Shutdown)
            .await
            .expect("shutdown command");
        wait_for(&mut snapshots, |s| s.lifecycle == SessionLifecycleState::ShutDown).await;
        timeout(Duration::from_secs(2), handle.join())
            .await
            .expect("runtime exits after shutdown");

        assert_eq!(
            gateway.emit(GatewayEvent::PeerOffline {
                peer_id: "peer_b".into()
            }),
            0
        );
        assert!(matches!(
            channels.send_command(SessionCommand::RefreshPeers).await,
            Err(SessionChannelError::CommandChannelClosed)
        ));
    }
}
