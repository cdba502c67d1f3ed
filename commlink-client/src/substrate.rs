//! Rendezvous substrate contract
//!
//! The session manager never talks to a concrete signaling network. It is
//! handed a [`Substrate`] implementation at initialization time and drives
//! everything through these traits, so tests can substitute an in-memory
//! fake that fires the documented events deterministically.
//!
//! All notifications from the substrate arrive on a single unbounded channel
//! as [`SubstrateEvent`] values, in delivery order. Adapters are expected to
//! map a connection or call "error" to the corresponding `Closed` event;
//! the session manager makes no distinction between graceful and abnormal
//! termination.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use commlink_common::DEFAULT_RELAY_ENDPOINTS;

// =============================================================================
// Media Streams
// =============================================================================

/// Opaque handle to a live audio stream.
///
/// The capture device behind an outbound stream is owned by the caller (the
/// UI layer); the session manager only clones this handle into outbound
/// calls and never stops or releases the underlying hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    id: Uuid,
}

impl MediaStream {
    /// Create a handle for a freshly acquired stream
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Unique id of the underlying stream
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for MediaStream {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Registration Configuration
// =============================================================================

/// Configuration passed to the substrate when opening a registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Relay-assist endpoint URLs used for connectivity negotiation
    pub relay_endpoints: Vec<String>,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            relay_endpoints: DEFAULT_RELAY_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Error reported by a substrate operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstrateError {
    message: String,
}

impl SubstrateError {
    /// Create an error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SubstrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Notifications delivered by the substrate on the registration's event
/// channel.
///
/// Connection and call lifecycle events are flattened onto the same queue as
/// registration events so the session manager observes everything in a
/// single delivery order.
#[derive(Debug)]
pub enum SubstrateEvent {
    /// The registration is live and reachable under `token`
    Open { token: String },
    /// The signaling link for this registration dropped (individual peer
    /// connections may still be alive)
    Disconnected,
    /// The substrate reported an error. `fatal` means the registration is
    /// unrecoverable; non-fatal errors are transient signaling failures.
    Error { fatal: bool, message: String },
    /// A remote peer opened an inbound data connection to us
    Connection { handle: Box<dyn ConnectionHandle> },
    /// A data connection (inbound or outbound) finished its open handshake
    ConnectionOpened { peer: String },
    /// A data connection closed or errored
    ConnectionClosed { peer: String },
    /// A remote peer is calling us with a voice stream
    Call { handle: Box<dyn CallHandle> },
    /// A remote media stream arrived on an answered call
    CallStream { peer: String, stream: MediaStream },
    /// A call (inbound or outbound) closed or errored
    CallClosed { peer: String },
}

// =============================================================================
// Handles
// =============================================================================

/// A bidirectional data connection to one remote peer.
///
/// Holding the handle keeps the connection alive; `close` tears it down.
pub trait ConnectionHandle: Send + fmt::Debug {
    /// Token of the remote peer
    fn peer(&self) -> &str;
    /// Close the connection (the substrate will deliver `ConnectionClosed`)
    fn close(&self);
}

/// One live voice call with a remote peer
pub trait CallHandle: Send + fmt::Debug {
    /// Token of the remote peer
    fn peer(&self) -> &str;
    /// Accept an inbound call (no-op on outbound calls)
    fn answer(&self);
    /// Hang up
    fn close(&self);
}

/// An active registration with the rendezvous directory
pub trait RegistrationHandle: Send + fmt::Debug {
    /// Initiate an outbound voice call carrying `stream` to a remote token
    fn call(
        &self,
        remote: &str,
        stream: &MediaStream,
    ) -> Result<Box<dyn CallHandle>, SubstrateError>;

    /// Open an outbound data connection to a remote token
    fn connect(&self, remote: &str) -> Result<Box<dyn ConnectionHandle>, SubstrateError>;

    /// Ask the substrate to re-establish a dropped signaling link.
    /// Fire-and-forget; the outcome arrives as `Open` or `Error` events.
    fn reconnect(&self);

    /// Release the registration and every resource behind it
    fn destroy(&self);
}

/// The rendezvous directory itself
pub trait Substrate: Send + Sync {
    /// Open a registration under `token`.
    ///
    /// All subsequent notifications for this registration are delivered on
    /// `events`. Registration is asynchronous: a successful return only
    /// means the attempt started; the token is live once `Open` arrives.
    fn register(
        &self,
        token: &str,
        config: &RegisterConfig,
        events: mpsc::UnboundedSender<SubstrateEvent>,
    ) -> Result<Box<dyn RegistrationHandle>, SubstrateError>;
}
