//! Line-oriented console front end: input parsing and incremental rendering
//! of session snapshots.

use std::collections::HashSet;

use chrono::{DateTime, Local};
use lanchat_core::{
    FailureNotice, MessageView, NotificationId, PeerRow, SessionCommand, SessionSnapshot,
    Selection,
};

pub const HELP_TEXT: &str = "\
commands:
  /select <peer_id>   open a direct conversation
  /all                open the broadcast conversation
  /peers              refresh the peer list now
  /history            reload history of the open conversation
  /read               mark the open conversation as read
  /dismiss <id>       dismiss a notification
  /greet <name>       ask the backend for a greeting
  /quit               leave
anything else is sent to the open conversation";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(SessionCommand),
    Help,
    Empty,
    Unknown(String),
}

/// Parse a console line against the conversation currently open. Plain text
/// goes to the selected peer, or to everyone when the broadcast view is open.
pub fn parse_line(line: &str, selection: &Selection) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        let content = line.to_owned();
        return ConsoleInput::Command(match selection {
            Selection::Peer(peer_id) => SessionCommand::SendMessage {
                peer_id: peer_id.clone(),
                content,
            },
            Selection::Broadcast => SessionCommand::BroadcastMessage { content },
        });
    };

    let (verb, arg) = match rest.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (rest, ""),
    };
    let command = match (verb, arg) {
        ("help", _) => return ConsoleInput::Help,
        ("select", peer_id) if !peer_id.is_empty() => {
            SessionCommand::Select(Selection::Peer(peer_id.to_owned()))
        }
        ("all", _) => SessionCommand::Select(Selection::Broadcast),
        ("peers", _) => SessionCommand::RefreshPeers,
        ("history", _) => SessionCommand::ReloadHistory,
        ("read", _) => SessionCommand::MarkSelectionRead,
        ("dismiss", id) => match id.parse::<NotificationId>() {
            Ok(id) => SessionCommand::DismissNotification(id),
            Err(_) => return ConsoleInput::Unknown(line.to_owned()),
        },
        ("greet", name) if !name.is_empty() => SessionCommand::Greet {
            name: name.to_owned(),
        },
        ("quit" | "exit", _) => SessionCommand::Shutdown,
        _ => return ConsoleInput::Unknown(line.to_owned()),
    };
    ConsoleInput::Command(command)
}

/// Turns successive snapshots into the lines that changed since the last
/// render.
#[derive(Debug, Default)]
pub struct ConsoleView {
    status: Option<String>,
    peers: Vec<PeerRow>,
    selection: Option<Selection>,
    shown_messages: HashSet<i64>,
    // Ordering key of the newest message printed for the current view.
    newest_shown: Option<(u64, i64)>,
    shown_notifications: HashSet<NotificationId>,
    failure: Option<FailureNotice>,
    greeting: Option<String>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        let status = format!("{} | {}", snapshot.identity_label, snapshot.status_text);
        if self.status.as_ref() != Some(&status) {
            lines.push(format!("[status] {status}"));
            self.status = Some(status);
        }

        if self.peers != snapshot.peers {
            lines.push(format!("[peers] {}", peer_summary(&snapshot.peers)));
            self.peers = snapshot.peers.clone();
        }

        if self.selection.as_ref() != Some(&snapshot.selection) {
            lines.push(format!(
                "[view] {}",
                selection_label(&snapshot.selection, &snapshot.peers)
            ));
            self.selection = Some(snapshot.selection.clone());
            self.shown_messages.clear();
            self.newest_shown = None;
        }

        let backfilled = self.newest_shown.is_some_and(|newest| {
            snapshot.messages.iter().any(|message| {
                !self.shown_messages.contains(&message.message_id)
                    && (message.timestamp_ms, message.message_id) < newest
            })
        });
        if backfilled {
            lines.push(format!(
                "[view] {} (earlier messages arrived)",
                selection_label(&snapshot.selection, &snapshot.peers)
            ));
            self.shown_messages.clear();
        }
        for message in &snapshot.messages {
            if self.shown_messages.insert(message.message_id) {
                lines.push(message_line(message));
            }
        }
        self.newest_shown = snapshot
            .messages
            .last()
            .map(|message| (message.timestamp_ms, message.message_id))
            .max(self.newest_shown);

        for notification in &snapshot.notifications {
            if self.shown_notifications.insert(notification.id) {
                let sender = snapshot
                    .peers
                    .iter()
                    .find(|row| row.peer_id == notification.sender)
                    .map_or(notification.sender.as_str(), |row| row.display_name.as_str());
                lines.push(format!(
                    "[notify #{}] {sender}: {}",
                    notification.id, notification.content
                ));
            }
        }
        self.shown_notifications.retain(|id| {
            snapshot
                .notifications
                .iter()
                .any(|notification| notification.id == *id)
        });

        if self.failure != snapshot.failure {
            if let Some(notice) = &snapshot.failure {
                let hint = if notice.recoverable {
                    " (retry may help)"
                } else {
                    ""
                };
                lines.push(format!(
                    "[error] {:?} failed: {}{hint}",
                    notice.action, notice.message
                ));
            }
            self.failure = snapshot.failure.clone();
        }

        if self.greeting != snapshot.greeting {
            if let Some(greeting) = &snapshot.greeting {
                lines.push(format!("[greet] {greeting}"));
            }
            self.greeting = snapshot.greeting.clone();
        }

        lines
    }
}

fn message_line(message: &MessageView) -> String {
    format!(
        "{} {}: {}",
        clock_time(message.timestamp_ms),
        message.sender_label,
        message.content
    )
}

fn peer_summary(peers: &[PeerRow]) -> String {
    if peers.is_empty() {
        return "none discovered yet".to_owned();
    }
    peers
        .iter()
        .map(|row| {
            let presence = if row.is_online { "online" } else { "offline" };
            match row.unread_count {
                0 => format!("{} [{}] ({presence})", row.display_name, row.peer_id),
                unread => format!(
                    "{} [{}] ({presence}, {unread} unread)",
                    row.display_name, row.peer_id
                ),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn selection_label(selection: &Selection, peers: &[PeerRow]) -> String {
    match selection {
        Selection::Broadcast => "broadcast".to_owned(),
        Selection::Peer(peer_id) => {
            let name = peers
                .iter()
                .find(|row| row.peer_id == *peer_id)
                .map_or(peer_id.as_str(), |row| row.display_name.as_str());
            format!("conversation with {name}")
        }
    }
}

fn clock_time(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_owned())
}
