//! Client-side reconciliation core for the LanChat peer-to-peer LAN chat.
//!
//! This crate merges pulled snapshots and pushed events into one peer
//! directory and one ordered message log, derives conversation views and
//! pop-up notifications, and exposes the session reducer the UI drives.

/// Command/change channel primitives.
pub mod channel;
/// Filtering of the message log down to one conversation.
pub mod conversation;
/// Timestamp-ordered peer directory merge.
pub mod directory;
/// Stable gateway error types.
pub mod error;
/// Cached local identity.
pub mod identity;
/// Deduplicated, ordered message log.
pub mod message_store;
/// Validation of backend payloads into typed records.
pub mod normalization;
/// Pop-up notification gate.
pub mod notifications;
/// Backoff policy used by retry loops.
pub mod retry;
/// Session reducer and UI snapshot.
pub mod session;
/// Session lifecycle state machine.
pub mod state_machine;
/// Domain records and push events.
pub mod types;

pub use channel::{ChangeStream, SessionChannelError, SessionChannels, SessionCommand, StoreChange};
pub use directory::PeerDirectory;
pub use error::{GatewayError, GatewayErrorCategory};
pub use identity::{IdentityState, LocalIdentityHolder};
pub use message_store::MessageStore;
pub use notifications::{NotificationManager, NotificationPolicy};
pub use retry::RetryPolicy;
pub use session::{ChatSession, MessageView, PeerRow, SessionConfig, SessionSnapshot};
pub use state_machine::{SessionAction, SessionLifecycleState, SessionStateMachine};
pub use types::{
    ConversationTarget, FailureNotice, GatewayEvent, LocalIdentity, Message, Notification,
    NotificationId, Peer, PeerAddress, PeerEvent, PendingMessage, Selection, UserAction,
};
