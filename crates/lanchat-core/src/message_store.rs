use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::types::{ConversationTarget, Message, PendingMessage};

/// Largest send-time gap between a provisional message and the persisted
/// copy that replaces it.
pub const PROVISIONAL_MATCH_WINDOW_MS: u64 = 60_000;

/// Ordered, deduplicated message log fed by history loads and live events.
///
/// Messages are keyed by `(timestamp_ms, id)`, so iteration order is always
/// ascending by timestamp with ties broken by id, whatever the arrival order.
///
/// Live messages that arrive before the backend assigned an id are held
/// under negative provisional ids until their persisted copy shows up.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    ordered: BTreeMap<(u64, i64), Message>,
    timestamps_by_id: HashMap<i64, u64>,
    provisional: HashSet<i64>,
    last_provisional_id: i64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a fetched history batch for `target`.
    ///
    /// Every message of the batch that belongs to the target scope is merged
    /// into the store; the returned sequence holds at most the `limit` most
    /// recent of them in ascending order. `limit <= 0` yields an empty
    /// sequence and ingests nothing.
    pub fn load_history(
        &mut self,
        target: &ConversationTarget,
        limit: i64,
        batch: Vec<Message>,
    ) -> Vec<Message> {
        if limit <= 0 {
            debug!(?target, limit, "history load skipped for non-positive limit");
            return Vec::new();
        }

        let mut seen_ids = HashSet::new();
        let mut scoped: Vec<Message> = batch
            .into_iter()
            .filter(|message| message.in_scope(target) && seen_ids.insert(message.id))
            .collect();
        scoped.sort_by_key(|message| (message.timestamp_ms, message.id));

        let mut inserted = 0_usize;
        for message in &scoped {
            if self.insert(message.clone()) {
                inserted += 1;
            }
        }

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if scoped.len() > limit {
            let excess = scoped.len() - limit;
            scoped.drain(0..excess);
        }
        debug!(
            ?target,
            kept = scoped.len(),
            inserted,
            store_len = self.len(),
            "history batch ingested"
        );
        scoped
    }

    /// Ingest one live message. Returns `false` when its id was already
    /// present (the store is left untouched).
    pub fn append_live(&mut self, message: Message) -> bool {
        let id = message.id;
        let inserted = self.insert(message);
        if !inserted {
            trace!(message_id = id, "duplicate live message ignored");
        }
        inserted
    }

    /// Ingest a live message that has no backend id yet. Returns the
    /// provisional id, or `None` when the message is already present.
    pub fn append_pending(&mut self, pending: PendingMessage) -> Option<i64> {
        // A replayed event repeats the exact send time; a persisted copy may
        // carry its own save time.
        let duplicate = self.ordered.values().any(|message| {
            let gap = message.timestamp_ms.abs_diff(pending.timestamp_ms);
            let close_enough = if self.provisional.contains(&message.id) {
                gap == 0
            } else {
                gap <= PROVISIONAL_MATCH_WINDOW_MS
            };
            close_enough
                && message.conversation_target == pending.conversation_target
                && message.sender_id == pending.sender_id
                && message.content == pending.content
        });
        if duplicate {
            trace!(sender = %pending.sender_id, "pending message already stored");
            return None;
        }

        self.last_provisional_id -= 1;
        let id = self.last_provisional_id;
        self.provisional.insert(id);
        self.insert(pending.into_message(id));
        Some(id)
    }

    /// Whether `id` is a provisional id handed out by [`Self::append_pending`].
    pub fn is_provisional(&self, id: i64) -> bool {
        self.provisional.contains(&id)
    }

    /// Number of messages still waiting for their persisted copy.
    pub fn provisional_len(&self) -> usize {
        self.provisional.len()
    }

    /// All messages, ascending by timestamp then id.
    pub fn get_all(&self) -> Vec<Message> {
        self.ordered.values().cloned().collect()
    }

    /// Borrowing iterator in the same order as [`Self::get_all`].
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.ordered.values()
    }

    pub fn get(&self, id: i64) -> Option<&Message> {
        let timestamp_ms = *self.timestamps_by_id.get(&id)?;
        self.ordered.get(&(timestamp_ms, id))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.timestamps_by_id.contains_key(&id)
    }

    /// Acknowledge every unread message matching `predicate`. Returns how
    /// many flipped.
    pub fn mark_read_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        let mut flipped = 0;
        for message in self.ordered.values_mut() {
            if !message.is_read && predicate(message) {
                message.is_read = true;
                flipped += 1;
            }
        }
        flipped
    }

    /// Count unread messages matching `predicate`.
    pub fn unread_count<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        self.ordered
            .values()
            .filter(|message| !message.is_read && predicate(message))
            .count()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn insert(&mut self, mut message: Message) -> bool {
        if self.timestamps_by_id.contains_key(&message.id) {
            return false;
        }
        if !self.provisional.contains(&message.id)
            && let Some(replaced) = self.take_provisional_copy(&message)
        {
            trace!(provisional_id = replaced.id, message_id = message.id, "provisional message persisted");
            message.is_read |= replaced.is_read;
        }
        self.timestamps_by_id
            .insert(message.id, message.timestamp_ms);
        self.ordered
            .insert((message.timestamp_ms, message.id), message);
        true
    }

    fn take_provisional_copy(&mut self, persisted: &Message) -> Option<Message> {
        if self.provisional.is_empty() {
            return None;
        }
        let key = self
            .provisional
            .iter()
            .filter_map(|id| Some((*self.timestamps_by_id.get(id)?, *id)))
            .filter(|key| {
                self.ordered.get(key).is_some_and(|candidate| {
                    candidate.conversation_target == persisted.conversation_target
                        && candidate.sender_id == persisted.sender_id
                        && candidate.content == persisted.content
                })
            })
            .min_by_key(|(timestamp_ms, _)| timestamp_ms.abs_diff(persisted.timestamp_ms))
            .filter(|(timestamp_ms, _)| {
                timestamp_ms.abs_diff(persisted.timestamp_ms) <= PROVISIONAL_MATCH_WINDOW_MS
            })?;
        self.provisional.remove(&key.1);
        self.timestamps_by_id.remove(&key.1);
        self.ordered.remove(&key)
    }
}
