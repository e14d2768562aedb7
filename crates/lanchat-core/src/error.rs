use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FailureNotice, UserAction};

/// Broad error category used for user-facing handling and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayErrorCategory {
    /// Invalid input or unsupported request.
    Config,
    /// Transient network or transport failure.
    Network,
    /// A call did not complete within its deadline.
    Timeout,
    /// Backend not reachable or not initialized yet.
    Unavailable,
    /// Malformed or unexpected payload shape (data integrity).
    Serialization,
    /// Invariant break inside the client.
    Internal,
}

impl GatewayErrorCategory {
    /// Whether retrying the same call may succeed.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Unavailable)
    }
}

/// Stable error payload produced by gateway calls and session transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct GatewayError {
    /// High-level error category.
    pub category: GatewayErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl GatewayError {
    /// Construct a new gateway error.
    pub fn new(
        category: GatewayErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Payload failed validation at the gateway boundary.
    pub fn malformed(what: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            GatewayErrorCategory::Serialization,
            "malformed_payload",
            format!("malformed {what}: {detail}"),
        )
    }

    /// Backend link is gone or was never established.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            GatewayErrorCategory::Unavailable,
            "backend_unavailable",
            message,
        )
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: impl std::fmt::Debug, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            GatewayErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while session is in state {current:?}"),
        )
    }

    pub fn is_recoverable(&self) -> bool {
        self.category.is_recoverable()
    }

    /// Convert into the notice shown for a failed user action.
    pub fn into_notice(self, action: UserAction) -> FailureNotice {
        let recoverable = self.is_recoverable();
        FailureNotice {
            action,
            code: self.code,
            message: self.message,
            recoverable,
        }
    }
}
