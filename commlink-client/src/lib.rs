//! Commlink client core
//!
//! Peer-to-peer push-to-talk over a rendezvous substrate. The entry point is
//! [`SessionManager`]: initialize it with a channel frequency and callsign,
//! then drive voice through `broadcast_voice`/`stop_broadcast` and watch
//! roster and stream notifications arrive on the channel you supplied.

pub mod session;
pub mod substrate;

pub use session::{SessionError, SessionEvent, SessionManager};
pub use substrate::{
    CallHandle, ConnectionHandle, MediaStream, RegisterConfig, RegistrationHandle, Substrate,
    SubstrateError, SubstrateEvent,
};
