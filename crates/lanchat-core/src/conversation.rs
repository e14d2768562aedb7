//! Derived conversation view over the message store.

use crate::types::{Message, Selection};

/// Whether `message` shows up in the conversation for `selection`.
///
/// A peer conversation covers messages addressed to the peer and messages
/// sent by it, since replies may be recorded against the broadcast context.
pub fn is_visible(message: &Message, selection: &Selection) -> bool {
    match selection {
        Selection::Peer(peer_id) => {
            message.conversation_target.peer_id() == Some(peer_id.as_str())
                || message.sender_id == *peer_id
        }
        Selection::Broadcast => true,
    }
}

/// Filter an ordered message sequence down to `selection`, preserving order.
pub fn filter<'a, I>(messages: I, selection: &Selection) -> Vec<Message>
where
    I: IntoIterator<Item = &'a Message>,
{
    messages
        .into_iter()
        .filter(|message| is_visible(message, selection))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationTarget;

    fn message(id: i64, target: ConversationTarget, sender: &str) -> Message {
        Message {
            id,
            conversation_target: target,
            sender_id: sender.to_owned(),
            content: format!("m{id}"),
            timestamp_ms: 1_000 + id as u64,
            is_read: false,
        }
    }

    fn sample() -> Vec<Message> {
        vec![
            message(1, ConversationTarget::Peer("peer_b".into()), "local"),
            message(2, ConversationTarget::Broadcast, "peer_b"),
            message(3, ConversationTarget::Peer("peer_c".into()), "local"),
            message(4, ConversationTarget::Broadcast, "peer_c"),
            message(5, ConversationTarget::Peer("local".into()), "peer_b"),
        ]
    }

    #[test]
    fn peer_selection_matches_target_or_sender() {
        let messages = sample();
        let view = filter(&messages, &Selection::Peer("peer_b".into()));
        let ids: Vec<i64> = view.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 5]);

        let expected: Vec<Message> = messages
            .iter()
            .filter(|m| {
                m.conversation_target == ConversationTarget::Peer("peer_b".into())
                    || m.sender_id == "peer_b"
            })
            .cloned()
            .collect();
        assert_eq!(view, expected);
    }

    #[test]
    fn broadcast_selection_returns_everything() {
        let messages = sample();
        assert_eq!(filter(&messages, &Selection::Broadcast), messages);
    }

    #[test]
    fn unknown_peer_yields_empty_view() {
        let messages = sample();
        assert!(filter(&messages, &Selection::Peer("peer_z".into())).is_empty());
    }
}
