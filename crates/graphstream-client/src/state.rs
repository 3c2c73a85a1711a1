// SPDX-License-Identifier: Apache-2.0
//! The client-side connection lifecycle (`spec.md` §4.6): transport
//! handshake, the `connection_established` readiness gate, and the
//! exponential-backoff reconnect policy.

use rand::Rng;
use std::time::Duration;

/// Initial reconnect backoff before the first doubling.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Reconnect backoff never grows past this, regardless of attempt count.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Maximum jitter added on top of the computed backoff.
pub const MAX_JITTER: Duration = Duration::from_secs(1);
/// Reconnect attempts allowed before giving up, unless the session was
/// `Ready` immediately before the disconnect (in which case the counter
/// resets to zero on the next successful connect).
pub const MAX_ATTEMPTS_BEFORE_FAILED: u32 = 5;

/// A session's place in the lifecycle diagram from `spec.md` §4.6.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Ready <-> (messages) -> Closed
///                    |                                      ^
///                    v                                      |
///               Reconnecting ----------------------------------
///                    |
///                    v
///                 Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport attempt is in flight.
    Disconnected,
    /// A transport connect attempt is in flight.
    Connecting,
    /// Transport handshake succeeded; binary traffic is still discarded
    /// until `connection_established` arrives.
    Connected,
    /// `connection_established` has been received; binary traffic is
    /// accepted and nudges may be sent.
    Ready,
    /// A previously connected session is waiting out its backoff timer.
    Reconnecting,
    /// Reconnect attempts are exhausted. Terminal until an external reset.
    Failed,
    /// The session was closed deliberately (not a transport failure).
    Closed,
}

/// Drives [`ConnectionState`] transitions and computes the reconnect
/// backoff schedule. Carries no transport of its own; the caller drives
/// actual I/O and reports outcomes back through these methods.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    attempt: u32,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Creates a machine in the [`ConnectionState::Disconnected`] state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of reconnect attempts made since the last successful `Ready`
    /// transition (or since construction, if never `Ready`).
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Begins a transport connect attempt.
    pub fn begin_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Reports that the transport handshake succeeded. Binary traffic is
    /// still not permitted until [`Self::mark_ready`].
    pub fn mark_connected(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// Reports that the server sent `connection_established`. Resets the
    /// reconnect attempt counter, per `spec.md` §4.6.
    pub fn mark_ready(&mut self) {
        self.state = ConnectionState::Ready;
        self.attempt = 0;
    }

    /// Reports that the transport closed or failed. Returns the backoff
    /// duration to wait before the next attempt, or `None` if the attempt
    /// budget is exhausted (the machine is now [`ConnectionState::Failed`]).
    ///
    /// A disconnect from [`ConnectionState::Ready`] does not count against
    /// the attempt budget in the same way a disconnect earlier in the
    /// handshake does: the counter was already reset to zero by the
    /// preceding [`Self::mark_ready`], so this call starts counting fresh.
    pub fn report_disconnect(&mut self, rng: &mut impl Rng) -> Option<Duration> {
        if self.attempt >= MAX_ATTEMPTS_BEFORE_FAILED {
            self.state = ConnectionState::Failed;
            return None;
        }
        self.state = ConnectionState::Reconnecting;
        let backoff = next_backoff(self.attempt, rng);
        self.attempt += 1;
        Some(backoff)
    }

    /// Deliberately closes the session (not a transport failure). Terminal
    /// like `Failed`, but does not imply a reconnect policy failure.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Clears `Failed`/`Closed` back to `Disconnected` and resets the
    /// attempt counter, allowing the caller to try again. Per `spec.md`
    /// §7, clients must not do this automatically after `Failed` — it
    /// requires an explicit, user-visible reset.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.attempt = 0;
    }
}

/// Computes `min(INITIAL_BACKOFF * 2^attempt, MAX_BACKOFF)` plus up to
/// [`MAX_JITTER`] of random jitter.
fn next_backoff(attempt: u32, rng: &mut impl Rng) -> Duration {
    let doubled = INITIAL_BACKOFF.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let base = doubled.min(MAX_BACKOFF);
    let jitter = Duration::from_millis(rng.gen_range(0..=MAX_JITTER.as_millis() as u64));
    base + jitter
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn happy_path_reaches_ready_and_resets_attempt_counter() {
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connecting();
        assert_eq!(machine.state(), ConnectionState::Connecting);
        machine.mark_connected();
        assert_eq!(machine.state(), ConnectionState::Connected);
        machine.mark_ready();
        assert_eq!(machine.state(), ConnectionState::Ready);
        assert_eq!(machine.attempt(), 0);
    }

    #[test]
    fn backoff_doubles_and_caps_at_max() {
        let mut rng = StepRng::new(0, 1);
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connecting();
        machine.mark_connected();

        let mut backoffs = Vec::new();
        for _ in 0..MAX_ATTEMPTS_BEFORE_FAILED {
            let backoff = machine.report_disconnect(&mut rng).expect("not yet failed");
            backoffs.push(backoff);
            machine.begin_connecting();
        }
        assert_eq!(backoffs[0].as_secs(), 1);
        assert_eq!(backoffs[1].as_secs(), 2);
        assert_eq!(backoffs[2].as_secs(), 4);
        assert!(backoffs.iter().all(|b| *b <= MAX_BACKOFF + MAX_JITTER));
    }

    #[test]
    fn exhausting_attempts_transitions_to_failed() {
        let mut rng = StepRng::new(0, 1);
        let mut machine = ConnectionStateMachine::new();
        for _ in 0..MAX_ATTEMPTS_BEFORE_FAILED {
            machine.begin_connecting();
            machine.report_disconnect(&mut rng);
        }
        machine.begin_connecting();
        assert!(machine.report_disconnect(&mut rng).is_none());
        assert_eq!(machine.state(), ConnectionState::Failed);
    }

    #[test]
    fn reaching_ready_then_disconnecting_starts_counting_from_zero_again() {
        let mut rng = StepRng::new(0, 1);
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connecting();
        machine.mark_connected();
        machine.mark_ready();

        let backoff = machine.report_disconnect(&mut rng).unwrap();
        assert_eq!(backoff.as_secs(), 1);
    }

    #[test]
    fn reset_clears_failed_state() {
        let mut rng = StepRng::new(0, 1);
        let mut machine = ConnectionStateMachine::new();
        for _ in 0..=MAX_ATTEMPTS_BEFORE_FAILED {
            machine.begin_connecting();
            machine.report_disconnect(&mut rng);
        }
        assert_eq!(machine.state(), ConnectionState::Failed);
        machine.reset();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.attempt(), 0);
    }
}
