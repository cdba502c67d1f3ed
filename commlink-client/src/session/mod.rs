//! Peer session management

mod manager;
mod roster;
mod state;

pub use manager::{
    INITIALIZE_TIMEOUT, RECONNECT_RETRY_DELAY, SessionError, SessionEvent, SessionManager,
};
pub use roster::Roster;
pub use state::RegistrationState;
