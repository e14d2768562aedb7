use std::sync::{Arc, Mutex};

use lanchat_core::{Selection, SessionCommand};
use lanchat_gateway::{BackendGateway, RuntimeConfig, SessionHandle, spawn_session};
use tracing::{debug, info, warn};

use crate::console::{ConsoleInput, HELP_TEXT, parse_line};

/// Callback that renders snapshots for the user.
pub type UiUpdateCallback = lanchat_gateway::SnapshotCallback;

/// What the input loop should do after a line was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    /// Text to show the user directly.
    Reply(String),
    Quit,
}

/// Bridges console input and session snapshots.
pub struct DesktopBridge {
    handle: SessionHandle,
    // Only this bridge issues selection changes, so its copy stays ahead of
    // the runtime's published one.
    selection: Mutex<Selection>,
}

impl DesktopBridge {
    /// Start the session runtime and forward its snapshots to `ui_update`.
    pub fn spawn<G: BackendGateway>(
        gateway: Arc<G>,
        config: RuntimeConfig,
        ui_update: UiUpdateCallback,
    ) -> Self {
        info!(
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "spawning desktop bridge"
        );
        Self {
            handle: spawn_session(gateway, config, Some(ui_update)),
            selection: Mutex::new(Selection::Broadcast),
        }
    }

    /// Handle one line typed by the user.
    pub fn submit_line(&self, line: &str) -> LineOutcome {
        let selection = self.current_selection();
        match parse_line(line, &selection) {
            ConsoleInput::Empty => LineOutcome::Continue,
            ConsoleInput::Help => LineOutcome::Reply(HELP_TEXT.to_owned()),
            ConsoleInput::Unknown(text) => {
                LineOutcome::Reply(format!("unknown command: {text} (try /help)"))
            }
            ConsoleInput::Command(SessionCommand::Shutdown) => LineOutcome::Quit,
            ConsoleInput::Command(command) => {
                if let SessionCommand::Select(next) = &command {
                    self.set_selection(next.clone());
                }
                self.enqueue_command(command);
                LineOutcome::Continue
            }
        }
    }

    /// Stop the runtime and wait for it to exit.
    pub async fn shutdown(self) {
        info!("shutting down desktop bridge");
        self.handle.shutdown();
        self.handle.join().await;
    }

    fn enqueue_command(&self, command: SessionCommand) {
        debug!(?command, "enqueue session command");
        if let Err(err) = self.handle.try_send(command) {
            warn!(error = %err, "failed to enqueue session command");
        }
    }

    fn current_selection(&self) -> Selection {
        self.selection
            .lock()
            .map(|selection| selection.clone())
            .unwrap_or(Selection::Broadcast)
    }

    fn set_selection(&self, next: Selection) {
        if let Ok(mut current) = self.selection.lock() {
            *current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lanchat_core::{ConversationTarget, Peer, PeerAddress, SessionSnapshot};
    use lanchat_gateway::InMemoryGateway;
    use tokio::{sync::mpsc, time::timeout};

    use super::*;

    fn peer(peer_id: &str) -> Peer {
        Peer {
            peer_id: peer_id.to_owned(),
            display_name: peer_id.to_uppercase(),
            address: PeerAddress {
                host: "10.0.0.9".to_owned(),
                port: None,
            },
            last_seen_ms: 1_000,
            is_online: true,
        }
    }

    #[tokio::test]
    async fn routes_plain_text_to_selected_conversation() {
        let gateway = InMemoryGateway::new().with_identity("local", "Me");
        gateway.set_peers([peer("peer_b")]);
        let (snapshot_tx, _snapshots) = mpsc::unbounded_channel();
        let ui_update: UiUpdateCallback = Arc::new(move |snapshot: SessionSnapshot| {
            let _ = snapshot_tx.send(snapshot);
        });
        let bridge = DesktopBridge::spawn(
            Arc::new(gateway.clone()),
            RuntimeConfig::default(),
            ui_update,
        );

        assert_eq!(bridge.submit_line("/select peer_b"), LineOutcome::Continue);
        assert_eq!(bridge.submit_line("hi bob"), LineOutcome::Continue);
        assert_eq!(bridge.submit_line("/all"), LineOutcome::Continue);
        assert_eq!(bridge.submit_line("hi everyone"), LineOutcome::Continue);
        assert!(matches!(bridge.submit_line("/help"), LineOutcome::Reply(_)));
        assert_eq!(bridge.submit_line("/quit"), LineOutcome::Quit);

        timeout(Duration::from_secs(2), async {
            while gateway.sent().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("both sends reach the gateway");

        let targets: Vec<ConversationTarget> =
            gateway.sent().into_iter().map(|sent| sent.target).collect();
        assert_eq!(
            targets,
            vec![
                ConversationTarget::Peer("peer_b".into()),
                ConversationTarget::Broadcast
            ]
        );
        bridge.shutdown().await;
    }
}
