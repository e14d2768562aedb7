//! Session reducer: one owner for directory, store, notifications, identity
//! and selection, mutated only through the entry points below.

use std::{collections::VecDeque, time::Duration};

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::{
    channel::StoreChange,
    conversation,
    directory::PeerDirectory,
    error::GatewayError,
    identity::LocalIdentityHolder,
    message_store::MessageStore,
    normalization::normalize_action_outcome,
    notifications::{NotificationManager, NotificationPolicy},
    state_machine::{SessionAction, SessionLifecycleState, SessionStateMachine},
    types::{
        ConversationTarget, FailureNotice, GatewayEvent, LocalIdentity, Message, Notification,
        NotificationId, Peer, PeerEvent, PendingMessage, Selection, UserAction,
    },
};

/// Default number of history messages requested per conversation.
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Arrivals held back while the local identity is unknown. Older ones are
/// dropped first.
pub const MAX_DEFERRED_NOTIFICATIONS: usize = 64;

/// Tunables of the session reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Messages requested per history load; `<= 0` disables history.
    pub history_limit: i64,
    pub notification_policy: NotificationPolicy,
    /// Offline peers older than this are dropped; `None` keeps them.
    pub offline_retention: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            notification_policy: NotificationPolicy::default(),
            offline_retention: None,
        }
    }
}

/// Sidebar row for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRow {
    pub peer_id: String,
    pub display_name: String,
    pub address: String,
    pub is_online: bool,
    pub last_seen_ms: u64,
    pub unread_count: usize,
    pub is_selected: bool,
}

/// Message row of the selected conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub message_id: i64,
    pub sender_id: String,
    pub sender_label: String,
    pub content: String,
    pub timestamp_ms: u64,
    pub is_own: bool,
    pub is_read: bool,
}

/// Read-only view handed to the UI after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub peers: Vec<PeerRow>,
    pub messages: Vec<MessageView>,
    pub notifications: Vec<Notification>,
    pub selection: Selection,
    pub identity_label: String,
    pub lifecycle: SessionLifecycleState,
    pub status_text: String,
    pub failure: Option<FailureNotice>,
    pub greeting: Option<String>,
    /// Unread broadcast messages from other peers.
    pub broadcast_unread: usize,
}

#[derive(Debug)]
pub struct ChatSession {
    config: SessionConfig,
    directory: PeerDirectory,
    store: MessageStore,
    notifications: NotificationManager,
    identity: LocalIdentityHolder,
    selection: Selection,
    lifecycle: SessionStateMachine,
    failure: Option<FailureNotice>,
    greeting: Option<String>,
    // Arrivals seen before the local identity resolved, with the time they
    // arrived. Self-echoes cannot be told apart until then.
    deferred: VecDeque<(Message, u64)>,
    change_tx: Option<broadcast::Sender<StoreChange>>,
}

impl ChatSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            directory: PeerDirectory::new(),
            store: MessageStore::new(),
            notifications: NotificationManager::new(config.notification_policy),
            identity: LocalIdentityHolder::new(),
            selection: Selection::Broadcast,
            lifecycle: SessionStateMachine::default(),
            failure: None,
            greeting: None,
            deferred: VecDeque::new(),
            change_tx: None,
        }
    }

    /// Publish changes on `change_tx`.
    pub fn with_change_sender(mut self, change_tx: broadcast::Sender<StoreChange>) -> Self {
        self.change_tx = Some(change_tx);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> SessionLifecycleState {
        self.lifecycle.state()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn identity(&self) -> &LocalIdentityHolder {
        &self.identity
    }

    pub fn active_notifications(&self) -> &[Notification] {
        self.notifications.active()
    }

    pub fn failure(&self) -> Option<&FailureNotice> {
        self.failure.as_ref()
    }

    /// Validate that a gateway call may be issued now.
    pub fn check_call(&self, action: SessionAction) -> Result<(), GatewayError> {
        let mut trial = self.lifecycle.clone();
        trial.apply(action).map(|_| ())
    }

    /// Move from `Cold` to `Starting`; the caller then issues the initial
    /// identity, peer and history loads.
    pub fn begin_start(&mut self) -> Result<(), GatewayError> {
        self.lifecycle.apply(SessionAction::Start)?;
        info!("session starting");
        self.emit(StoreChange::Lifecycle);
        Ok(())
    }

    /// Record an identity lookup outcome.
    pub fn on_identity_loaded(&mut self, result: Result<LocalIdentity, GatewayError>) -> bool {
        if !self.accepts("identity") {
            return false;
        }
        let failure = result.as_ref().err().cloned();
        let changed = self.identity.resolve(result);
        match failure {
            Some(err) if !self.identity.is_resolved() => {
                self.set_failure(err.into_notice(UserAction::IdentityLookup));
            }
            Some(_) => {}
            None => self.clear_failure_for(UserAction::IdentityLookup),
        }
        if changed {
            self.emit(StoreChange::Identity);
        }
        if self.identity.is_resolved() {
            self.flush_deferred();
        }
        changed
    }

    /// Merge a pulled peer snapshot. Failures keep the previous directory.
    pub fn on_peer_snapshot(&mut self, result: Result<Vec<Peer>, GatewayError>) -> bool {
        if !self.accepts("peer snapshot") {
            return false;
        }
        let peers = match result {
            Ok(peers) => peers,
            Err(err) => {
                warn!(error = %err, "peer snapshot failed; keeping previous directory");
                return false;
            }
        };

        let changed = self.directory.apply_snapshot(peers);
        if changed {
            self.emit(StoreChange::Peers);
        }
        match self.lifecycle.apply(SessionAction::MarkLive) {
            Ok(true) => {
                info!(peers = self.directory.len(), "session live");
                self.emit(StoreChange::Lifecycle);
            }
            Ok(false) => {}
            Err(err) => debug!(error = %err, "snapshot landed outside of start"),
        }
        changed
    }

    /// Ingest a fetched history batch for `target`. Returns the loaded
    /// window (at most `history_limit` messages).
    pub fn on_history_loaded(
        &mut self,
        target: &ConversationTarget,
        result: Result<Vec<Message>, GatewayError>,
    ) -> Vec<Message> {
        if !self.accepts("history") {
            return Vec::new();
        }
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                warn!(?target, error = %err, "history load failed; keeping store");
                return Vec::new();
            }
        };

        let before = (self.store.len(), self.store.provisional_len());
        let window = self
            .store
            .load_history(target, self.config.history_limit, batch);
        if (self.store.len(), self.store.provisional_len()) != before {
            self.emit(StoreChange::Messages);
        }
        window
    }

    /// Apply one push event. Returns the notification it produced, if any.
    pub fn on_event(&mut self, event: GatewayEvent, now_ms: u64) -> Option<Notification> {
        if !self.accepts("push event") {
            return None;
        }
        match event {
            GatewayEvent::PeerDiscovered(mut peer) => {
                // Announcements without a usable last_seen count as seen now.
                if peer.last_seen_ms == 0 {
                    peer.last_seen_ms = now_ms;
                }
                if self.directory.apply_event(PeerEvent::Discovered(peer)) {
                    self.emit(StoreChange::Peers);
                }
                None
            }
            GatewayEvent::PeerOffline { peer_id } => {
                let event = PeerEvent::Offline {
                    peer_id,
                    at_ms: now_ms,
                };
                if self.directory.apply_event(event) {
                    self.emit(StoreChange::Peers);
                }
                None
            }
            GatewayEvent::MessageReceived(message) => {
                if !self.store.append_live(message.clone()) {
                    return None;
                }
                self.emit(StoreChange::Messages);
                self.notify_arrival(message, now_ms)
            }
            GatewayEvent::MessagePending(pending) => {
                let id = self.store.append_pending(pending)?;
                let message = self.store.get(id).cloned()?;
                debug!(provisional_id = id, sender = %message.sender_id, "message held until persisted");
                self.emit(StoreChange::Messages);
                self.notify_arrival(message, now_ms)
            }
        }
    }

    /// History scope to reload so the persisted copy of `pending` replaces
    /// its provisional entry.
    pub fn pending_scope(&self, pending: &PendingMessage) -> ConversationTarget {
        pending.history_scope(self.identity.peer_id())
    }

    fn notify_arrival(&mut self, message: Message, now_ms: u64) -> Option<Notification> {
        let Some(local_id) = self.identity.peer_id() else {
            if self.deferred.len() == MAX_DEFERRED_NOTIFICATIONS {
                self.deferred.pop_front();
            }
            trace!(message_id = message.id, "notification deferred until identity resolves");
            self.deferred.push_back((message, now_ms));
            return None;
        };
        let notification =
            self.notifications
                .on_message_arrived(&message, &self.selection, Some(local_id), now_ms);
        if notification.is_some() {
            self.emit(StoreChange::Notifications);
        }
        notification
    }

    fn flush_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let deferred = std::mem::take(&mut self.deferred);
        let mut raised = 0_usize;
        for (message, arrived_ms) in deferred {
            if !self.store.contains(message.id) {
                continue;
            }
            if self.notify_arrival(message, arrived_ms).is_some() {
                raised += 1;
            }
        }
        debug!(raised, "deferred notifications evaluated");
    }

    /// Focus another conversation. Pop-ups belonging to it are dismissed.
    /// Returns `true` when the selection changed.
    pub fn select(&mut self, selection: Selection) -> bool {
        if selection == self.selection {
            return false;
        }
        debug!(?selection, "selection changed");
        self.selection = selection;
        self.emit(StoreChange::Selection);

        let dismissed = self.notifications.dismiss_conversation(&self.selection);
        if !dismissed.is_empty() {
            trace!(count = dismissed.len(), "notifications dismissed by selection");
            self.emit(StoreChange::Notifications);
        }
        true
    }

    /// Mark every message of the selected conversation as read.
    pub fn mark_selection_read(&mut self) -> usize {
        let selection = self.selection.clone();
        let flipped = self
            .store
            .mark_read_where(|message| conversation::is_visible(message, &selection));
        if flipped > 0 {
            self.emit(StoreChange::Messages);
        }
        flipped
    }

    pub fn dismiss_notification(&mut self, id: NotificationId) -> bool {
        let dismissed = self.notifications.dismiss(id);
        if dismissed {
            self.emit(StoreChange::Notifications);
        }
        dismissed
    }

    /// Drop notifications past their ttl.
    pub fn expire_notifications(&mut self, now_ms: u64) -> Vec<NotificationId> {
        let expired = self.notifications.expire_due(now_ms);
        if !expired.is_empty() {
            self.emit(StoreChange::Notifications);
        }
        expired
    }

    /// Drop long-offline peers when a retention is configured.
    pub fn purge_departed(&mut self, now_ms: u64) -> Vec<String> {
        let Some(retention) = self.config.offline_retention else {
            return Vec::new();
        };
        let removed = self.directory.purge_departed(now_ms, retention);
        if !removed.is_empty() {
            self.emit(StoreChange::Peers);
        }
        removed
    }

    /// Record the outcome of a send, broadcast or other user call.
    pub fn on_action_result(&mut self, action: UserAction, result: Result<(), GatewayError>) {
        if !self.accepts("action result") {
            return;
        }
        match normalize_action_outcome(action, result) {
            Some(notice) => {
                warn!(?action, code = %notice.code, "user action failed");
                self.set_failure(notice);
            }
            None => self.clear_failure_for(action),
        }
    }

    pub fn on_greeting(&mut self, result: Result<String, GatewayError>) {
        if !self.accepts("greeting") {
            return;
        }
        match result {
            Ok(greeting) => {
                self.greeting = Some(greeting);
                self.clear_failure_for(UserAction::Greet);
                self.emit(StoreChange::Greeting);
            }
            Err(err) => self.set_failure(err.into_notice(UserAction::Greet)),
        }
    }

    pub fn clear_failure(&mut self) {
        if self.failure.take().is_some() {
            self.emit(StoreChange::Failure);
        }
    }

    /// Stop accepting completions. Returns `false` when already shut down.
    pub fn shutdown(&mut self) -> bool {
        match self.lifecycle.apply(SessionAction::Shutdown) {
            Ok(_) => {
                info!("session shut down");
                self.emit(StoreChange::Lifecycle);
                true
            }
            Err(err) => {
                debug!(error = %err, "shutdown ignored");
                false
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let local_id = self.identity.peer_id();
        let is_incoming = |message: &Message| Some(message.sender_id.as_str()) != local_id;

        let peers = self
            .directory
            .peers()
            .map(|peer| {
                let scope = Selection::Peer(peer.peer_id.clone());
                PeerRow {
                    peer_id: peer.peer_id.clone(),
                    display_name: peer.display_name.clone(),
                    address: peer.address.display(),
                    is_online: peer.is_online,
                    last_seen_ms: peer.last_seen_ms,
                    unread_count: self.store.unread_count(|message| {
                        is_incoming(message) && conversation::is_visible(message, &scope)
                    }),
                    is_selected: self.selection == scope,
                }
            })
            .collect();

        let messages = self
            .store
            .iter()
            .filter(|message| conversation::is_visible(message, &self.selection))
            .map(|message| self.message_view(message))
            .collect();

        SessionSnapshot {
            peers,
            messages,
            notifications: self.notifications.active().to_vec(),
            selection: self.selection.clone(),
            identity_label: self.identity.display_label(),
            lifecycle: self.lifecycle.state(),
            status_text: self.status_text(),
            failure: self.failure.clone(),
            greeting: self.greeting.clone(),
            broadcast_unread: self
                .store
                .unread_count(|message| is_incoming(message) && message.conversation_target.is_broadcast()),
        }
    }

    fn message_view(&self, message: &Message) -> MessageView {
        let is_own = self.identity.peer_id() == Some(message.sender_id.as_str());
        let sender_label = if is_own {
            self.identity.display_label()
        } else {
            self.directory
                .get(&message.sender_id)
                .map(|peer| peer.display_name.clone())
                .unwrap_or_else(|| message.sender_id.clone())
        };
        MessageView {
            message_id: message.id,
            sender_id: message.sender_id.clone(),
            sender_label,
            content: message.content.clone(),
            timestamp_ms: message.timestamp_ms,
            is_own,
            is_read: message.is_read,
        }
    }

    fn status_text(&self) -> String {
        match self.lifecycle.state() {
            SessionLifecycleState::Cold => "Idle".to_owned(),
            SessionLifecycleState::Starting => "Connecting".to_owned(),
            SessionLifecycleState::Live => {
                format!("{} peers online", self.directory.online_peers().count())
            }
            SessionLifecycleState::ShutDown => "Disconnected".to_owned(),
        }
    }

    fn accepts(&self, what: &str) -> bool {
        let accepts = self.lifecycle.accepts_completions();
        if !accepts {
            trace!(what, "completion discarded after shutdown");
        }
        accepts
    }

    fn set_failure(&mut self, notice: FailureNotice) {
        self.failure = Some(notice);
        self.emit(StoreChange::Failure);
    }

    fn clear_failure_for(&mut self, action: UserAction) {
        if self
            .failure
            .as_ref()
            .is_some_and(|notice| notice.action == action)
        {
            self.failure = None;
            self.emit(StoreChange::Failure);
        }
    }

    fn emit(&self, change: StoreChange) {
        let Some(change_tx) = &self.change_tx else {
            return;
        };
        if change_tx.send(change).is_err() {
            trace!(?change, "no change subscribers");
        }
    }
}
