use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{NotificationId, Selection};

/// Which part of the session changed; subscribers re-read the snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StoreChange {
    Peers,
    Messages,
    Selection,
    Notifications,
    Identity,
    Lifecycle,
    Failure,
    Greeting,
}

/// User actions posted from the UI to the session runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Focus a peer conversation or the broadcast view.
    Select(Selection),
    /// Direct message to one peer.
    SendMessage { peer_id: String, content: String },
    /// Message to every peer.
    BroadcastMessage { content: String },
    /// Dismiss one pop-up.
    DismissNotification(NotificationId),
    /// Acknowledge everything visible in the current conversation.
    MarkSelectionRead,
    /// Pull a fresh peer snapshot now.
    RefreshPeers,
    /// Reload history for the current selection.
    ReloadHistory,
    /// Ask the backend for a greeting.
    Greet { name: String },
    /// Cancel polling and stop the runtime.
    Shutdown,
}

/// Change feed receiver used by UI subscribers.
pub type ChangeStream = broadcast::Receiver<StoreChange>;

/// Errors returned by session channel operations.
#[derive(Debug, Error)]
pub enum SessionChannelError {
    /// The runtime stopped and dropped its command receiver.
    #[error("session command channel is closed")]
    CommandChannelClosed,
}

/// Command/change channel pair shared by the runtime and UI layers.
#[derive(Clone, Debug)]
pub struct SessionChannels {
    command_tx: mpsc::Sender<SessionCommand>,
    change_tx: broadcast::Sender<StoreChange>,
}

impl SessionChannels {
    /// Create a new channel set and return it with the command receiver.
    pub fn new(
        command_buffer: usize,
        change_buffer: usize,
    ) -> (Self, mpsc::Receiver<SessionCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (change_tx, _) = broadcast::channel(change_buffer.max(1));
        (
            Self {
                command_tx,
                change_tx,
            },
            command_rx,
        )
    }

    /// Change sender handed to the session reducer.
    pub fn change_sender(&self) -> broadcast::Sender<StoreChange> {
        self.change_tx.clone()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> ChangeStream {
        self.change_tx.subscribe()
    }

    /// Post one command to the runtime.
    pub async fn send_command(&self, command: SessionCommand) -> Result<(), SessionChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionChannelError::CommandChannelClosed)
    }

    /// Non-async variant for callers outside the runtime (UI callbacks).
    pub fn try_send_command(&self, command: SessionCommand) -> Result<(), SessionChannelError> {
        self.command_tx
            .try_send(command)
            .map_err(|_| SessionChannelError::CommandChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_commands_to_receiver() {
        let (channels, mut rx) = SessionChannels::new(8, 8);
        channels
            .send_command(SessionCommand::Select(Selection::Peer("peer_b".into())))
            .await
            .expect("command send should work");

        let command = rx.recv().await.expect("receiver should have a command");
        assert_eq!(
            command,
            SessionCommand::Select(Selection::Peer("peer_b".into()))
        );
    }

    #[tokio::test]
    async fn fans_out_changes_to_subscribers() {
        let (channels, _rx) = SessionChannels::new(4, 16);
        let mut a = channels.subscribe();
        let mut b = channels.subscribe();

        channels
            .change_sender()
            .send(StoreChange::Peers)
            .expect("subscribers are attached");

        assert_eq!(a.recv().await.expect("a receives"), StoreChange::Peers);
        assert_eq!(b.recv().await.expect("b receives"), StoreChange::Peers);
    }

    #[tokio::test]
    async fn reports_closed_runtime() {
        let (channels, rx) = SessionChannels::new(1, 1);
        drop(rx);
        let err = channels
            .send_command(SessionCommand::Shutdown)
            .await
            .expect_err("closed receiver must fail");
        assert!(matches!(err, SessionChannelError::CommandChannelClosed));
    }
}
