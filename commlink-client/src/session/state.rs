//! Registration state machine
//!
//! The session manager owns exactly one registration with the rendezvous
//! substrate and tracks it with this state machine. Substrate events are the
//! input symbols; every transition the manager performs is checked against
//! the legal set here.

/// Lifecycle of the manager's registration with the rendezvous substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationState {
    /// No registration attempt has been made
    #[default]
    Unregistered,
    /// Registration sent, waiting for the substrate to confirm
    Registering,
    /// Token is live and reachable
    Registered,
    /// The signaling link dropped after a successful registration
    Disconnected,
    /// A reconnect was requested and its outcome is pending
    Reconnecting,
    /// The manager was torn down; terminal
    Destroyed,
}

impl RegistrationState {
    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// `Destroyed` is reachable from every state (teardown is always
    /// allowed) and has no outgoing transitions.
    pub fn can_enter(self, next: RegistrationState) -> bool {
        use RegistrationState::*;

        if self == Destroyed {
            return false;
        }
        if next == Destroyed {
            return true;
        }

        matches!(
            (self, next),
            (Unregistered, Registering)
                | (Registering, Registered)
                | (Registered, Disconnected)
                | (Disconnected, Reconnecting)
                | (Reconnecting, Registered)
                // The substrate may drop again while a reconnect is pending
                | (Reconnecting, Disconnected)
        )
    }

    /// String form for log lines
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationState::Unregistered => "unregistered",
            RegistrationState::Registering => "registering",
            RegistrationState::Registered => "registered",
            RegistrationState::Disconnected => "disconnected",
            RegistrationState::Reconnecting => "reconnecting",
            RegistrationState::Destroyed => "destroyed",
        }
    }
}
