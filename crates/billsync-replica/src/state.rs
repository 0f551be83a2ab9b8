//! Change-feed state machine
//!
//! ```text
//! Disconnected → Connecting → Subscribed ⇄ (Degraded → Reconnecting) → Disconnected
//! ```
//!
//! Every state may return to `Disconnected` except `Disconnected` itself.

use billsync_partition::PartitionName;
use serde::Serialize;
use std::fmt;

/// Subscriber lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedState {
    /// No subscription
    Disconnected,
    /// First subscribe in flight
    Connecting,
    /// Acknowledged and receiving events
    Subscribed,
    /// Subscription lost or refused
    Degraded,
    /// Resubscribe in flight
    Reconnecting,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Degraded => "degraded",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Illegal feed state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal feed transition {from} -> {to}")]
pub struct TransitionError {
    /// State left
    pub from: FeedState,
    /// State requested
    pub to: FeedState,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: FeedState) -> Vec<FeedState> {
    use FeedState::{Connecting, Degraded, Disconnected, Reconnecting, Subscribed};
    match from {
        Disconnected => vec![Connecting],
        Connecting => vec![Subscribed, Degraded, Disconnected],
        Subscribed => vec![Degraded, Disconnected],
        Degraded => vec![Reconnecting, Disconnected],
        Reconnecting => vec![Subscribed, Degraded, Disconnected],
    }
}

/// Validate a transition
///
/// # Errors
/// `TransitionError` if `to` is not reachable from `from`
pub fn validate_transition(from: FeedState, to: FeedState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Observable feed status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    /// Current state
    pub state: FeedState,
    /// Partition of the current attachment
    pub partition: Option<PartitionName>,
    /// Attachment epoch
    pub epoch: u64,
    /// Consecutive failed subscribe attempts
    pub failed_attempts: u32,
    /// Most recent failure
    pub last_error: Option<String>,
}

impl FeedStatus {
    /// Detached status
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            state: FeedState::Disconnected,
            partition: None,
            epoch: 0,
            failed_attempts: 0,
            last_error: None,
        }
    }

    /// Check if events are flowing
    #[inline]
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state == FeedState::Subscribed
    }
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FeedState::*;

    #[test]
    fn lifecycle_path_is_valid() {
        let path = [Disconnected, Connecting, Subscribed, Degraded, Reconnecting, Subscribed, Disconnected];
        for pair in path.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok(), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn initial_failure_degrades() {
        assert!(validate_transition(Connecting, Degraded).is_ok());
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert_eq!(
            validate_transition(Disconnected, Subscribed),
            Err(TransitionError { from: Disconnected, to: Subscribed })
        );
        assert!(validate_transition(Subscribed, Reconnecting).is_err());
        assert!(validate_transition(Degraded, Subscribed).is_err());
        assert!(validate_transition(Disconnected, Disconnected).is_err());
    }

    #[test]
    fn every_state_can_disconnect() {
        for state in [Connecting, Subscribed, Degraded, Reconnecting] {
            assert!(allowed_transitions(state).contains(&Disconnected));
        }
    }
}
