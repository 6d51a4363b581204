//! Connection state machine.
//!
//! Transitions:
//! `Disconnected -> Connecting -> Connected`, `Connected -> Disconnected`
//! (clean close), and `Connecting|Connected -> Connecting` (abnormal close
//! with budget remaining) or `-> Errored` (budget spent or close code 1008).

/// Normal closure; terminal, never reconnected.
pub const CLOSE_NORMAL: u16 = 1000;
/// Policy violation / auth rejection; terminal, surfaced as an error.
pub const CLOSE_POLICY: u16 = 1008;

/// Connection status as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting)
    }
}

/// Verdict of the retry schedule after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Reconnect after the configured delay; `attempt` is 1-based.
    Retry { attempt: u32 },
    /// Budget spent: stay `Errored` until the caller intervenes.
    GiveUp,
}

/// Full connection state published on the watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Reconnect attempts consumed since the last `disconnect()`. A
    /// successful open does not reset this; only an explicit disconnect does.
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotency guard for `connect()`: returns false without touching the
    /// state when a connect is already in flight or established.
    pub(crate) fn begin_connect(&mut self) -> bool {
        if matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        true
    }

    pub(crate) fn mark_connected(&mut self) {
        debug_assert!(self.status.is_connecting());
        self.status = ConnectionStatus::Connected;
        self.last_error = None;
    }

    /// Clean server close (code 1000). Attempt budget is left as-is.
    pub(crate) fn mark_closed(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }

    /// Explicit `disconnect()`: the one transition that resets the budget.
    pub(crate) fn mark_disconnected(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.attempt_count = 0;
        self.last_error = None;
    }

    /// Terminal failure (auth rejection, budget exhausted).
    pub(crate) fn mark_errored(&mut self, reason: impl Into<String>) {
        self.status = ConnectionStatus::Errored;
        self.last_error = Some(reason.into());
    }

    /// Abnormal close or connect failure: consume budget or give up.
    /// On `Retry` the status moves to `Connecting` for the delay window.
    pub(crate) fn record_failure(
        &mut self,
        reason: impl Into<String>,
        max_attempts: u32,
    ) -> RetryDecision {
        let reason = reason.into();
        self.last_error = Some(reason);
        if self.attempt_count < max_attempts {
            self.attempt_count += 1;
            self.status = ConnectionStatus::Connecting;
            RetryDecision::Retry {
                attempt: self.attempt_count,
            }
        } else {
            self.status = ConnectionStatus::Errored;
            RetryDecision::GiveUp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_connect_is_idempotent() {
        let mut state = ConnectionState::new();
        assert!(state.begin_connect());
        assert!(!state.begin_connect());
        state.mark_connected();
        assert!(!state.begin_connect());
        assert_eq!(state.status, ConnectionStatus::Connected);
    }

    #[test]
    fn failures_consume_budget_then_give_up() {
        let mut state = ConnectionState::new();
        assert!(state.begin_connect());
        assert_eq!(
            state.record_failure("closed: code 1006", 2),
            RetryDecision::Retry { attempt: 1 }
        );
        assert_eq!(
            state.record_failure("closed: code 1006", 2),
            RetryDecision::Retry { attempt: 2 }
        );
        assert_eq!(state.record_failure("closed: code 1006", 2), RetryDecision::GiveUp);
        assert_eq!(state.status, ConnectionStatus::Errored);
        assert_eq!(state.attempt_count, 2);
    }

    #[test]
    fn successful_open_keeps_attempt_count() {
        let mut state = ConnectionState::new();
        assert!(state.begin_connect());
        state.record_failure("refused", 5);
        state.mark_connected();
        assert_eq!(state.attempt_count, 1);
    }

    #[test]
    fn disconnect_resets_budget() {
        let mut state = ConnectionState::new();
        state.begin_connect();
        state.record_failure("refused", 5);
        state.mark_disconnected();
        assert_eq!(state.attempt_count, 0);
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.last_error.is_none());
    }
}
