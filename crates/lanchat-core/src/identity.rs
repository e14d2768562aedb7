use tracing::{info, warn};

use crate::{error::GatewayError, types::LocalIdentity};

/// Label rendered while the local identity cannot be resolved.
pub const UNKNOWN_IDENTITY_LABEL: &str = "Unknown identity";
const PENDING_IDENTITY_LABEL: &str = "Connecting...";

/// Resolution state of the local peer identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    /// Lookup not finished yet.
    #[default]
    Pending,
    /// Backend returned the identity.
    Resolved(LocalIdentity),
    /// Lookup failed; the UI renders a placeholder.
    Unknown {
        /// Stable error code of the last failure.
        error_code: String,
    },
}

/// Caches the local identity fetched once at startup.
#[derive(Debug, Clone, Default)]
pub struct LocalIdentityHolder {
    state: IdentityState,
}

impl LocalIdentityHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of an identity lookup. Returns `true` when the
    /// visible state changed.
    ///
    /// A successful reissue replaces the cached identity. A failure after a
    /// successful lookup keeps the resolved identity.
    pub fn resolve(&mut self, result: Result<LocalIdentity, GatewayError>) -> bool {
        let next = match result {
            Ok(identity) => {
                info!(peer_id = %identity.peer_id, name = %identity.display_name, "local identity resolved");
                IdentityState::Resolved(identity)
            }
            Err(err) => {
                warn!(error = %err, "local identity lookup failed");
                if matches!(self.state, IdentityState::Resolved(_)) {
                    return false;
                }
                IdentityState::Unknown {
                    error_code: err.code,
                }
            }
        };
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }

    pub fn state(&self) -> &IdentityState {
        &self.state
    }

    pub fn identity(&self) -> Option<&LocalIdentity> {
        match &self.state {
            IdentityState::Resolved(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.identity().map(|identity| identity.peer_id.as_str())
    }

    pub fn is_resolved(&self) -> bool {
        self.identity().is_some()
    }

    /// Text the UI shows for the local user.
    pub fn display_label(&self) -> String {
        match &self.state {
            IdentityState::Pending => PENDING_IDENTITY_LABEL.to_owned(),
            IdentityState::Resolved(identity) => identity.display_name.clone(),
            IdentityState::Unknown { .. } => UNKNOWN_IDENTITY_LABEL.to_owned(),
        }
    }
}
