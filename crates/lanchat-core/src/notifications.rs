use std::time::Duration;

use tracing::{debug, trace};

use crate::{
    conversation,
    types::{ConversationTarget, Message, Notification, NotificationId, Selection},
};

/// Default maximum number of characters shown in a pop-up.
pub const DEFAULT_MAX_CHARS: usize = 100;
/// Marker appended to truncated pop-up content.
pub const ELLIPSIS: &str = "...";

/// Display and lifetime policy for pop-up notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPolicy {
    /// Maximum characters of message content kept (`>= 1`).
    pub max_chars: usize,
    /// Optional auto-expiry; `None` keeps notifications until dismissed.
    pub ttl: Option<Duration>,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            ttl: None,
        }
    }
}

/// Derives pop-up entries from incoming messages and tracks their dismissal.
#[derive(Debug, Clone)]
pub struct NotificationManager {
    policy: NotificationPolicy,
    active: Vec<Notification>,
    next_id: NotificationId,
}

impl NotificationManager {
    pub fn new(policy: NotificationPolicy) -> Self {
        Self {
            policy: NotificationPolicy {
                max_chars: policy.max_chars.max(1),
                ..policy
            },
            active: Vec::new(),
            next_id: 1,
        }
    }

    pub fn policy(&self) -> NotificationPolicy {
        self.policy
    }

    /// Decide whether `message` deserves a pop-up and create it.
    ///
    /// Self-echoes and messages belonging to the conversation the user is
    /// looking at are suppressed.
    pub fn on_message_arrived(
        &mut self,
        message: &Message,
        active_selection: &Selection,
        local_identity: Option<&str>,
        now_ms: u64,
    ) -> Option<Notification> {
        if local_identity == Some(message.sender_id.as_str()) {
            trace!(message_id = message.id, "self-echo suppressed");
            return None;
        }
        if matches_active_conversation(message, active_selection) {
            trace!(message_id = message.id, ?active_selection, "active conversation suppressed");
            return None;
        }

        let notification = Notification {
            id: self.next_id,
            message_id: message.id,
            conversation: message.conversation_target.clone(),
            sender: message.sender_id.clone(),
            content: truncate_chars(&message.content, self.policy.max_chars),
            timestamp_ms: message.timestamp_ms,
            created_at_ms: now_ms,
        };
        self.next_id += 1;
        debug!(
            notification_id = notification.id,
            message_id = message.id,
            sender = %notification.sender,
            "notification created"
        );
        self.active.push(notification.clone());
        Some(notification)
    }

    /// Dismiss one notification. Absent ids are a no-op.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        let before = self.active.len();
        self.active.retain(|notification| notification.id != id);
        self.active.len() != before
    }

    /// Dismiss everything belonging to the conversation now on screen.
    pub fn dismiss_conversation(&mut self, selection: &Selection) -> Vec<NotificationId> {
        let mut dismissed = Vec::new();
        self.active.retain(|notification| {
            let covered = match selection {
                Selection::Peer(peer_id) => {
                    notification.conversation.peer_id() == Some(peer_id.as_str())
                        || notification.sender == *peer_id
                }
                Selection::Broadcast => notification.conversation.is_broadcast(),
            };
            if covered {
                dismissed.push(notification.id);
            }
            !covered
        });
        dismissed
    }

    /// Dismiss notifications older than the configured ttl, if any.
    pub fn expire_due(&mut self, now_ms: u64) -> Vec<NotificationId> {
        let Some(ttl) = self.policy.ttl else {
            return Vec::new();
        };
        let ttl_ms = ttl.as_millis().min(u128::from(u64::MAX)) as u64;
        let mut expired = Vec::new();
        self.active.retain(|notification| {
            let due = now_ms.saturating_sub(notification.created_at_ms) >= ttl_ms;
            if due {
                expired.push(notification.id);
            }
            !due
        });
        if !expired.is_empty() {
            debug!(count = expired.len(), "notifications expired");
        }
        expired
    }

    /// Live notifications in creation order.
    pub fn active(&self) -> &[Notification] {
        &self.active
    }
}

fn matches_active_conversation(message: &Message, selection: &Selection) -> bool {
    match selection {
        Selection::Peer(_) => conversation::is_visible(message, selection),
        // The broadcast view lists everything, but direct messages still
        // deserve a pop-up there.
        Selection::Broadcast => message.conversation_target == ConversationTarget::Broadcast,
    }
}

/// Truncate to `max_chars` characters, appending [`ELLIPSIS`] when cut.
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &content[..byte_index]),
        None => content.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64, target: ConversationTarget, sender: &str, content: &str) -> Message {
        Message {
            id,
            conversation_target: target,
            sender_id: sender.to_owned(),
            content: content.to_owned(),
            timestamp_ms: 1_700_000_000_000,
            is_read: false,
        }
    }

    fn direct_from(sender: &str) -> Message {
        message(1, ConversationTarget::Peer("local".into()), sender, "hello")
    }

    #[test]
    fn notifies_when_other_peer_is_selected() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        let created = manager.on_message_arrived(
            &direct_from("peer_c"),
            &Selection::Peer("peer_b".into()),
            Some("local"),
            10,
        );
        let created = created.expect("message from C while B is open must notify");
        assert_eq!(created.sender, "peer_c");
        assert_eq!(created.message_id, 1);
        assert_eq!(manager.active().len(), 1);
    }

    #[test]
    fn suppressed_when_sender_conversation_is_open() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        assert!(manager
            .on_message_arrived(
                &direct_from("peer_c"),
                &Selection::Peer("peer_c".into()),
                Some("local"),
                10,
            )
            .is_none());
        assert!(manager.active().is_empty());
    }

    #[test]
    fn self_echo_never_notifies() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        let echo = message(2, ConversationTarget::Broadcast, "local", "mine");
        assert!(manager
            .on_message_arrived(&echo, &Selection::Peer("peer_b".into()), Some("local"), 10)
            .is_none());
    }

    #[test]
    fn broadcast_view_suppresses_broadcasts_but_not_direct_messages() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        let shout = message(3, ConversationTarget::Broadcast, "peer_b", "everyone");
        assert!(manager
            .on_message_arrived(&shout, &Selection::Broadcast, Some("local"), 10)
            .is_none());
        assert!(manager
            .on_message_arrived(&direct_from("peer_b"), &Selection::Broadcast, Some("local"), 10)
            .is_some());
    }

    #[test]
    fn truncates_long_content_with_ellipsis() {
        let mut manager = NotificationManager::new(NotificationPolicy {
            max_chars: 5,
            ttl: None,
        });
        let long = message(4, ConversationTarget::Broadcast, "peer_b", "héllo world");
        let created = manager
            .on_message_arrived(&long, &Selection::Peer("peer_x".into()), None, 10)
            .expect("should notify");
        assert_eq!(created.content, "héllo...");

        assert_eq!(truncate_chars("short", 5), "short");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn dismiss_is_idempotent() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        let created = manager
            .on_message_arrived(&direct_from("peer_c"), &Selection::Broadcast, None, 10)
            .expect("should notify");
        assert!(manager.dismiss(created.id));
        assert!(!manager.dismiss(created.id));
        assert!(!manager.dismiss(999));
        assert!(manager.active().is_empty());
    }

    #[test]
    fn ids_are_unique_per_occurrence() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        let first = manager
            .on_message_arrived(&direct_from("peer_c"), &Selection::Broadcast, None, 10)
            .expect("first");
        let second = manager
            .on_message_arrived(&direct_from("peer_d"), &Selection::Broadcast, None, 11)
            .expect("second");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn expires_only_when_ttl_configured() {
        let mut keep = NotificationManager::new(NotificationPolicy::default());
        keep.on_message_arrived(&direct_from("peer_c"), &Selection::Broadcast, None, 0);
        assert!(keep.expire_due(u64::MAX).is_empty());
        assert_eq!(keep.active().len(), 1);

        let mut expiring = NotificationManager::new(NotificationPolicy {
            max_chars: DEFAULT_MAX_CHARS,
            ttl: Some(Duration::from_secs(5)),
        });
        let old = expiring
            .on_message_arrived(&direct_from("peer_c"), &Selection::Broadcast, None, 1_000)
            .expect("old");
        expiring.on_message_arrived(&direct_from("peer_d"), &Selection::Broadcast, None, 4_000);

        assert_eq!(expiring.expire_due(6_000), vec![old.id]);
        assert_eq!(expiring.active().len(), 1);
    }

    #[test]
    fn opening_conversation_dismisses_its_notifications() {
        let mut manager = NotificationManager::new(NotificationPolicy::default());
        manager.on_message_arrived(&direct_from("peer_c"), &Selection::Broadcast, None, 1);
        manager.on_message_arrived(&direct_from("peer_d"), &Selection::Broadcast, None, 2);

        let dismissed = manager.dismiss_conversation(&Selection::Peer("peer_c".into()));
        assert_eq!(dismissed.len(), 1);
        assert_eq!(manager.active().len(), 1);
        assert_eq!(manager.active()[0].sender, "peer_d");
    }
}
