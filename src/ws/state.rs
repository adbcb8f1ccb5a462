//! Channel lifecycle as a pure state machine.
//!
//! [`Lifecycle`] knows nothing about sockets or timers. The manager task feeds it
//! [`Event`]s as the transport and the reconnect timer produce them and performs
//! the [`Action`] it returns. Events that make no sense in the current state are
//! ignored, which is what keeps a stale transport from reaching the handler.

use std::time::Instant;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ConnectionState {
    /// No transport exists
    Idle,
    /// Handshake in flight
    Connecting {
        /// Attempt number, starting at 1
        attempt: u32,
    },
    /// Handshake succeeded and inbound messages are being dispatched
    Connected {
        /// Attempt number that produced this connection
        attempt: u32,
        /// When the connection was established
        since: Instant,
    },
    /// Transport is gone; the fixed reconnect delay is running
    ReconnectWait {
        /// Attempt number of the transport that was lost
        attempt: u32,
    },
    /// The application restart was requested; nothing follows
    Reloading,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Attempt number associated with this state, if any.
    #[must_use]
    pub const fn attempt(self) -> Option<u32> {
        match self {
            Self::Connecting { attempt }
            | Self::Connected { attempt, .. }
            | Self::ReconnectWait { attempt } => Some(attempt),
            Self::Idle | Self::Reloading => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Reloading)
    }
}

/// Something that happened to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The manager was constructed
    Start,
    /// Transport handshake completed
    Opened,
    /// Transport failed before the handshake completed
    Failed,
    /// A data frame arrived
    Inbound,
    /// An established transport closed or errored
    Closed,
    /// The reconnect delay elapsed
    TimerFired,
    /// The owner asked the manager to stop
    Shutdown,
}

/// What the driver must do in response to an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open a fresh transport for this attempt
    Open { attempt: u32 },
    /// Invoke `on_connect` for the new connection
    NotifyConnect,
    /// Invoke `on_message` with the inbound payload
    Dispatch,
    /// Drop the transport and start the reconnect delay
    ArmTimer,
    /// Invoke the restart capability
    Restart,
    /// Close whatever transport exists and stop
    Stop,
}

/// The channel state machine.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    attempts: u32,
    reload_on_disconnect: bool,
}

impl Lifecycle {
    #[must_use]
    pub fn new(reload_on_disconnect: bool) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            reload_on_disconnect,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of transports opened so far. Never decreases.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn reload_on_disconnect(&self) -> bool {
        self.reload_on_disconnect
    }

    /// Apply `event`, returning the action to perform or `None` when the event is
    /// not meaningful in the current state.
    pub fn apply(&mut self, event: Event) -> Option<Action> {
        use ConnectionState as S;

        let (next, action) = match (self.state, event) {
            (S::Idle, Event::Start) if self.attempts == 0 => {
                let attempt = self.next_attempt();
                (S::Connecting { attempt }, Action::Open { attempt })
            }
            (S::Connecting { attempt }, Event::Failed)
            | (S::Connected { attempt, .. }, Event::Closed) => {
                (S::ReconnectWait { attempt }, Action::ArmTimer)
            }
            (S::Connecting { attempt }, Event::Opened) => (
                S::Connected {
                    attempt,
                    since: Instant::now(),
                },
                Action::NotifyConnect,
            ),
            (state @ S::Connected { .. }, Event::Inbound) => (state, Action::Dispatch),
            (S::ReconnectWait { .. }, Event::TimerFired) if self.reload_on_disconnect => {
                (S::Reloading, Action::Restart)
            }
            (S::ReconnectWait { .. }, Event::TimerFired) => {
                let attempt = self.next_attempt();
                (S::Connecting { attempt }, Action::Open { attempt })
            }
            (S::Reloading, _) => return None,
            (_, Event::Shutdown) => (S::Idle, Action::Stop),
            _ => return None,
        };

        self.state = next;
        Some(action)
    }

    fn next_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }
}
