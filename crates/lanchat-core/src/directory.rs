use std::{collections::BTreeMap, time::Duration};

use tracing::{debug, trace};

use crate::types::{Peer, PeerEvent};

#[derive(Debug, Clone)]
struct PeerEntry {
    peer: Peer,
    // Timestamp of the update that last won for this record. Offline notices
    // advance it without touching `last_seen_ms`.
    stamp_ms: u64,
}

/// Merges snapshot pulls and push events into one `peer_id -> Peer` mapping.
///
/// Every merge is idempotent and order-insensitive: the update carrying the
/// later timestamp wins, equal timestamps leave the record untouched.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    entries: BTreeMap<String, PeerEntry>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a full snapshot. Returns `true` when any record changed.
    ///
    /// Peers missing from the snapshot are kept; only an explicit offline
    /// event takes a peer offline.
    pub fn apply_snapshot<I>(&mut self, peers: I) -> bool
    where
        I: IntoIterator<Item = Peer>,
    {
        let mut changed = false;
        let mut seen = 0_usize;
        for peer in peers {
            seen += 1;
            changed |= self.merge(peer);
        }
        debug!(
            snapshot_len = seen,
            directory_len = self.entries.len(),
            changed,
            "applied peer snapshot"
        );
        changed
    }

    /// Merge one push event. Returns `true` when the directory changed.
    pub fn apply_event(&mut self, event: PeerEvent) -> bool {
        match event {
            PeerEvent::Discovered(mut peer) => {
                peer.is_online = true;
                self.merge(peer)
            }
            PeerEvent::Offline { peer_id, at_ms } => {
                let Some(entry) = self.entries.get_mut(&peer_id) else {
                    trace!(%peer_id, "offline event for unknown peer ignored");
                    return false;
                };
                if at_ms <= entry.stamp_ms {
                    trace!(%peer_id, at_ms, stamp_ms = entry.stamp_ms, "stale offline event ignored");
                    return false;
                }
                entry.stamp_ms = at_ms;
                let was_online = entry.peer.is_online;
                entry.peer.is_online = false;
                debug!(%peer_id, was_online, "peer marked offline");
                was_online
            }
        }
    }

    /// Remove offline peers whose last winning update is at least `retention`
    /// old. Returns the removed identities.
    pub fn purge_departed(&mut self, now_ms: u64, retention: Duration) -> Vec<String> {
        let retention_ms = retention.as_millis().min(u128::from(u64::MAX)) as u64;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                !entry.peer.is_online && now_ms.saturating_sub(entry.stamp_ms) >= retention_ms
            })
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        for peer_id in &expired {
            self.entries.remove(peer_id);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "purged departed peers");
        }
        expired
    }

    pub fn get(&self, peer_id: &str) -> Option<&Peer> {
        self.entries.get(peer_id).map(|entry| &entry.peer)
    }

    /// All known peers ordered by `peer_id`.
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.entries.values().map(|entry| &entry.peer)
    }

    /// Peers currently reported reachable.
    pub fn online_peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers().filter(|peer| peer.is_online)
    }

    /// Owned copy of the current mapping.
    pub fn to_map(&self) -> BTreeMap<String, Peer> {
        self.entries
            .iter()
            .map(|(peer_id, entry)| (peer_id.clone(), entry.peer.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn merge(&mut self, incoming: Peer) -> bool {
        match self.entries.get_mut(&incoming.peer_id) {
            None => {
                trace!(peer_id = %incoming.peer_id, "new peer record");
                self.entries.insert(
                    incoming.peer_id.clone(),
                    PeerEntry {
                        stamp_ms: incoming.last_seen_ms,
                        peer: incoming,
                    },
                );
                true
            }
            Some(entry) if incoming.last_seen_ms > entry.stamp_ms => {
                let changed = entry.peer != incoming;
                entry.stamp_ms = incoming.last_seen_ms;
                entry.peer = incoming;
                changed
            }
            Some(entry) => {
                trace!(
                    peer_id = %incoming.peer_id,
                    incoming_ms = incoming.last_seen_ms,
                    stamp_ms = entry.stamp_ms,
                    "stale or replayed peer update ignored"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerAddress;

    fn peer(peer_id: &str, name: &str, last_seen_ms: u64, is_online: bool) -> Peer {
        Peer {
            peer_id: peer_id.to_owned(),
            display_name: name.to_owned(),
            address: PeerAddress {
                host: "192.168.1.10".to_owned(),
                port: Some(8080),
            },
            last_seen_ms,
            is_online,
        }
    }

    #[test]
    fn snapshot_inserts_and_keeps_missing_peers() {
        let mut directory = PeerDirectory::new();
        assert!(directory.apply_snapshot(vec![
            peer("a", "Alice", 1_000, true),
            peer("b", "Bob", 1_000, true),
        ]));

        assert!(!directory.apply_snapshot(vec![peer("a", "Alice", 1_000, true)]));
        assert_eq!(directory.len(), 2);
        assert!(directory.get("b").expect("b retained").is_online);
    }

    #[test]
    fn applying_same_snapshot_twice_is_idempotent() {
        let mut once = PeerDirectory::new();
        once.apply_snapshot(vec![peer("a", "Alice", 1_000, true)]);

        let mut twice = PeerDirectory::new();
        twice.apply_snapshot(vec![peer("a", "Alice", 1_000, true)]);
        let changed = twice.apply_snapshot(vec![peer("a", "Alice", 1_000, true)]);

        assert!(!changed);
        assert_eq!(once.to_map(), twice.to_map());
    }

    #[test]
    fn newer_snapshot_overwrites_display_fields() {
        let mut directory = PeerDirectory::new();
        directory.apply_snapshot(vec![peer("a", "Alice", 1_000, true)]);
        directory.apply_snapshot(vec![peer("a", "Alice (laptop)", 2_000, true)]);

        let a = directory.get("a").expect("a present");
        assert_eq!(a.display_name, "Alice (laptop)");
        assert_eq!(a.last_seen_ms, 2_000);
    }

    #[test]
    fn stale_snapshot_never_rolls_back_fresher_event() {
        let mut directory = PeerDirectory::new();
        directory.apply_event(PeerEvent::Discovered(peer("a", "Alice v2", 5_000, true)));
        directory.apply_snapshot(vec![peer("a", "Alice v1", 3_000, true)]);

        let a = directory.get("a").expect("a present");
        assert_eq!(a.display_name, "Alice v2");
        assert_eq!(a.last_seen_ms, 5_000);
    }

    #[test]
    fn offline_then_stale_snapshot_keeps_peer_offline() {
        let mut directory = PeerDirectory::new();
        directory.apply_snapshot(vec![peer("a", "Alice", 1_000, true)]);
        assert!(directory.apply_event(PeerEvent::Offline {
            peer_id: "a".to_owned(),
            at_ms: 2_000,
        }));

        directory.apply_snapshot(vec![peer("a", "Alice", 1_500, true)]);

        let a = directory.get("a").expect("record retained after offline");
        assert!(!a.is_online);
        assert_eq!(directory.online_peers().count(), 0);
    }

    #[test]
    fn discovery_after_offline_brings_peer_back() {
        let mut directory = PeerDirectory::new();
        directory.apply_snapshot(vec![peer("a", "Alice", 1_000, false)]);
        directory.apply_event(PeerEvent::Offline {
            peer_id: "a".to_owned(),
            at_ms: 2_000,
        });
        assert!(directory.apply_event(PeerEvent::Discovered(peer("a", "Alice", 3_000, false))));

        assert!(directory.get("a").expect("a present").is_online);
    }

    #[test]
    fn out_of_order_discovery_does_not_regress_last_seen() {
        let mut directory = PeerDirectory::new();
        directory.apply_event(PeerEvent::Discovered(peer("a", "Alice", 4_000, true)));
        assert!(!directory.apply_event(PeerEvent::Discovered(peer("a", "Alice", 2_000, true))));
        assert_eq!(directory.get("a").expect("a present").last_seen_ms, 4_000);
    }

    #[test]
    fn repeated_events_are_idempotent() {
        let mut directory = PeerDirectory::new();
        let discovered = PeerEvent::Discovered(peer("a", "Alice", 1_000, true));
        let offline = PeerEvent::Offline {
            peer_id: "a".to_owned(),
            at_ms: 2_000,
        };

        assert!(directory.apply_event(discovered.clone()));
        assert!(!directory.apply_event(discovered));
        assert!(directory.apply_event(offline.clone()));
        let before = directory.to_map();
        assert!(!directory.apply_event(offline));
        assert_eq!(before, directory.to_map());
    }

    #[test]
    fn offline_for_unknown_peer_is_noop() {
        let mut directory = PeerDirectory::new();
        assert!(!directory.apply_event(PeerEvent::Offline {
            peer_id: "ghost".to_owned(),
            at_ms: 10,
        }));
        assert!(directory.is_empty());
    }

    #[test]
    fn purge_removes_only_expired_offline_peers() {
        let mut directory = PeerDirectory::new();
        directory.apply_snapshot(vec![
            peer("a", "Alice", 1_000, true),
            peer("b", "Bob", 1_000, true),
        ]);
        directory.apply_event(PeerEvent::Offline {
            peer_id: "a".to_owned(),
            at_ms: 2_000,
        });

        assert!(directory
            .purge_departed(2_500, Duration::from_secs(1))
            .is_empty());
        let removed = directory.purge_departed(3_000, Duration::from_secs(1));
        assert_eq!(removed, vec!["a".to_owned()]);
        assert!(directory.get("a").is_none());
        assert!(directory.get("b").is_some());
    }
}
