//! Session construction state machine

use crate::{Error, Result};

/// Progress of a single session construction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing configured yet
    Unbuilt,

    /// Contact points, authenticator, protocol version and timeout set
    ClusterConfigured,

    /// TLS requested and security settings attached
    TlsConfigured,

    /// TLS not requested
    TlsSkipped,

    /// Driver returned a live session
    SessionCreated,

    /// Default consistency applied (or none requested)
    ConsistencyApplied,

    /// Validation query succeeded
    Validated,

    /// Attempt aborted; terminal
    Failed,
}

impl SessionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Unbuilt, ClusterConfigured)
                | (ClusterConfigured, TlsConfigured)
                | (ClusterConfigured, TlsSkipped)
                | (TlsConfigured, SessionCreated)
                | (TlsSkipped, SessionCreated)
                | (SessionCreated, ConsistencyApplied)
                | (ConsistencyApplied, Validated)
        ) || (next == Failed && !matches!(self, Validated | Failed))
    }

    /// Transition to new state
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether the attempt has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Validated | Self::Failed)
    }

    /// Metrics label for a failure observed in this state
    pub fn failure_stage(&self) -> &'static str {
        match self {
            Self::Unbuilt => "cluster",
            Self::ClusterConfigured => "tls",
            Self::TlsConfigured | Self::TlsSkipped => "create_session",
            Self::SessionCreated => "consistency",
            Self::ConsistencyApplied => "validation",
            Self::Validated | Self::Failed => "none",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbuilt => write!(f, "unbuilt"),
            Self::ClusterConfigured => write!(f, "cluster_configured"),
            Self::TlsConfigured => write!(f, "tls_configured"),
            Self::TlsSkipped => write!(f, "tls_skipped"),
            Self::SessionCreated => write!(f, "session_created"),
            Self::ConsistencyApplied => write!(f, "consistency_applied"),
            Self::Validated => write!(f, "validated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
