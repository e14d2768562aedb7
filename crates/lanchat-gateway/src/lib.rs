//! Backend gateway implementations and the session runtime that drives a
//! [`lanchat_core::ChatSession`] from gateway calls and push events.

/// Call surface of the backend host.
pub mod gateway;
/// Deterministic in-process gateway.
pub mod in_memory;
/// Newline-delimited JSON gateway over TCP.
pub mod json_link;
/// Polling, event and command loop around one session.
pub mod runtime;

pub use gateway::{BackendGateway, GatewayCall};
pub use in_memory::{InMemoryGateway, SentMessage};
pub use json_link::JsonLinesGateway;
pub use runtime::{RuntimeConfig, SessionHandle, SnapshotCallback, spawn_session};
