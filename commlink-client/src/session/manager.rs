//! Peer session manager
//!
//! Coordinates one registration with the rendezvous substrate: keeps the
//! live channel roster, answers inbound voice calls, fans outbound voice
//! out to every roster member, and repairs the signaling link when it
//! drops. All mutable state lives on a single spawned task; the caller
//! drives it through fire-and-forget commands and receives notifications
//! on the channel supplied at initialization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use commlink_common::identity;

use crate::substrate::{
    CallHandle, ConnectionHandle, MediaStream, RegisterConfig, RegistrationHandle, Substrate,
    SubstrateEvent,
};

use super::roster::Roster;
use super::state::RegistrationState;

// =============================================================================
// Constants
// =============================================================================

/// How long `initialize` waits for the substrate to confirm a registration
pub const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before retrying a failed signaling reconnect.
///
/// Fixed rather than exponential: the substrate already retries internally,
/// this loop only re-kicks it when those attempts error out.
pub const RECONNECT_RETRY_DELAY: Duration = Duration::from_secs(4);

// =============================================================================
// Events and Errors
// =============================================================================

/// Notifications emitted to the caller (the UI layer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Roster membership changed; carries an arrival-ordered snapshot of
    /// all current member tokens, self excluded
    RosterChanged(Vec<String>),
    /// A remote member's voice stream arrived; the caller owns playback
    StreamReceived { peer: String, stream: MediaStream },
    /// A remote member's voice stream ended
    StreamEnded { peer: String },
}

/// Errors fatal to a single `initialize` attempt.
///
/// Everything after a successful initialization is callback-based and
/// self-healing; only the initial registration outcome surfaces here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The substrate rejected the registration or was unreachable
    RegistrationFailed(String),
    /// The substrate never confirmed the registration in time
    Timeout,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::RegistrationFailed(message) => {
                write!(f, "registration failed: {}", message)
            }
            SessionError::Timeout => {
                write!(f, "timed out waiting for registration to open")
            }
        }
    }
}

/// Commands from the caller to the session task
#[derive(Debug)]
enum SessionCommand {
    BroadcastVoice(MediaStream),
    StopBroadcast,
    ConnectTo(String),
    Destroy,
}

// =============================================================================
// Session Manager (caller-facing handle)
// =============================================================================

/// Handle to a live peer session.
///
/// Created by [`SessionManager::initialize`]. All methods are synchronous
/// fire-and-forget; outcomes flow back on the notification channel. Dropping
/// the handle tears the session down.
#[derive(Debug)]
pub struct SessionManager {
    token: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionManager {
    /// Register on a channel and wait for the substrate to confirm.
    ///
    /// Resolves a fresh identity token from `frequency` and `callsign`,
    /// opens a registration with the default relay-assist endpoints, and
    /// waits up to [`INITIALIZE_TIMEOUT`] for confirmation. This is the only
    /// operation a caller should await; it resolves or fails exactly once,
    /// regardless of later background reconnection events.
    ///
    /// # Errors
    ///
    /// [`SessionError::RegistrationFailed`] if the substrate is unreachable
    /// or rejects the token, [`SessionError::Timeout`] if no confirmation
    /// arrives in time. The caller retries by initializing again, which
    /// resolves a brand-new token.
    pub async fn initialize(
        substrate: Arc<dyn Substrate>,
        frequency: &str,
        callsign: &str,
        notify: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        Self::initialize_with_config(
            substrate,
            frequency,
            callsign,
            RegisterConfig::default(),
            notify,
        )
        .await
    }

    /// Like [`initialize`](Self::initialize) with explicit relay endpoints
    pub async fn initialize_with_config(
        substrate: Arc<dyn Substrate>,
        frequency: &str,
        callsign: &str,
        config: RegisterConfig,
        notify: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let token = identity::resolve(frequency, callsign);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let registration = substrate
            .register(&token, &config, event_tx)
            .map_err(|e| SessionError::RegistrationFailed(e.to_string()))?;

        // Wait for the open confirmation, stashing any peer events that
        // race ahead of it so the session task can replay them.
        let mut early_events = Vec::new();
        let wait_for_open = async {
            loop {
                match event_rx.recv().await {
                    Some(SubstrateEvent::Open { token }) => break Ok(token),
                    Some(SubstrateEvent::Error {
                        fatal: true,
                        message,
                    }) => break Err(SessionError::RegistrationFailed(message)),
                    Some(other) => early_events.push(other),
                    None => {
                        break Err(SessionError::RegistrationFailed(
                            "substrate closed the event channel".to_string(),
                        ));
                    }
                }
            }
        };

        let confirmed = match tokio::time::timeout(INITIALIZE_TIMEOUT, wait_for_open).await {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(err)) => {
                registration.destroy();
                return Err(err);
            }
            Err(_) => {
                registration.destroy();
                return Err(SessionError::Timeout);
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let inner = SessionInner::new(registration, confirmed.clone(), notify);
        tokio::spawn(run_session(inner, event_rx, cmd_rx, early_events));

        Ok(Self {
            token: confirmed,
            commands: cmd_tx,
        })
    }

    /// The confirmed rendezvous token this session is registered under
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Fan an outbound voice call out to every current roster member.
    ///
    /// The stream handle is borrowed for the duration of the calls; the
    /// caller keeps ownership of the capture device. Per-member failures
    /// are logged and skipped, never surfaced.
    pub fn broadcast_voice(&self, stream: MediaStream) {
        let _ = self
            .commands
            .send(SessionCommand::BroadcastVoice(stream));
    }

    /// Close every outbound call from a prior broadcast. Idempotent.
    ///
    /// Inbound calls are unaffected; they close on their own events.
    pub fn stop_broadcast(&self) {
        let _ = self.commands.send(SessionCommand::StopBroadcast);
    }

    /// Open an outbound data connection to a known remote token.
    ///
    /// No-op when the peer is already on the roster. Used to announce
    /// ourselves to members discovered out of band.
    pub fn connect_to(&self, remote_token: &str) {
        let _ = self
            .commands
            .send(SessionCommand::ConnectTo(remote_token.to_string()));
    }

    /// Tear the session down: stop broadcasting, release the registration,
    /// clear the roster, and silence all further notifications.
    ///
    /// Idempotent and safe to call in any state.
    pub fn destroy(&self) {
        let _ = self.commands.send(SessionCommand::Destroy);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let _ = self.commands.send(SessionCommand::Destroy);
    }
}

// =============================================================================
// Session Task
// =============================================================================

/// Sleep until `deadline`, or forever when there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Owner task for one session: consumes substrate events and caller
/// commands from the same loop, so notification order matches delivery
/// order and a member's removal is always observed before a later
/// broadcast pass could include it.
async fn run_session(
    mut inner: SessionInner,
    mut event_rx: mpsc::UnboundedReceiver<SubstrateEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    early_events: Vec<SubstrateEvent>,
) {
    let mut retry_at: Option<Instant> = None;

    for event in early_events {
        if inner.handle_event(event) {
            retry_at = Some(Instant::now() + RECONNECT_RETRY_DELAY);
        }
    }

    while !inner.is_destroyed() {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => {
                    if inner.handle_event(event) {
                        retry_at = Some(Instant::now() + RECONNECT_RETRY_DELAY);
                    }
                }
                // Substrate dropped its sender: nothing left to listen to
                None => inner.destroy(),
            },
            command = cmd_rx.recv() => match command {
                Some(SessionCommand::BroadcastVoice(stream)) => inner.broadcast_voice(stream),
                Some(SessionCommand::StopBroadcast) => inner.stop_broadcast(),
                Some(SessionCommand::ConnectTo(remote)) => inner.connect_to(&remote),
                Some(SessionCommand::Destroy) | None => inner.destroy(),
            },
            _ = wait_until(retry_at), if retry_at.is_some() => {
                retry_at = None;
                inner.retry_reconnect();
            }
        }
    }
}

// =============================================================================
// Session State
// =============================================================================

/// All mutable session state. Owned exclusively by the session task; tests
/// drive it directly by injecting synthetic events.
struct SessionInner {
    registration: Box<dyn RegistrationHandle>,
    token: String,
    state: RegistrationState,
    roster: Roster,
    /// Accepted or initiated data connections, keyed by remote token.
    /// A second connection from the same token replaces the first entry.
    connections: HashMap<String, Box<dyn ConnectionHandle>>,
    /// Calls we answered, keyed by remote token
    inbound_calls: HashMap<String, Box<dyn CallHandle>>,
    /// Calls we initiated during a broadcast, keyed by remote token
    outbound_calls: HashMap<String, Box<dyn CallHandle>>,
    notify: mpsc::UnboundedSender<SessionEvent>,
    destroyed: bool,
}

impl SessionInner {
    fn new(
        registration: Box<dyn RegistrationHandle>,
        token: String,
        notify: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            registration,
            token,
            state: RegistrationState::Registered,
            roster: Roster::new(),
            connections: HashMap::new(),
            inbound_calls: HashMap::new(),
            outbound_calls: HashMap::new(),
            notify,
            destroyed: false,
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Move to `next` if the transition table allows it
    fn set_state(&mut self, next: RegistrationState) {
        if self.state == next {
            return;
        }
        if !self.state.can_enter(next) {
            eprintln!(
                "[session] ignoring illegal state transition {} -> {}",
                self.state.as_str(),
                next.as_str()
            );
            return;
        }
        self.state = next;
    }

    fn emit(&self, event: SessionEvent) {
        if self.destroyed {
            return;
        }
        let _ = self.notify.send(event);
    }

    fn emit_roster(&self) {
        self.emit(SessionEvent::RosterChanged(self.roster.snapshot()));
    }

    /// Apply one substrate event. Returns `true` when the caller should
    /// schedule a delayed reconnect retry.
    fn handle_event(&mut self, event: SubstrateEvent) -> bool {
        if self.destroyed {
            return false;
        }

        match event {
            SubstrateEvent::Open { .. } => {
                if self.state != RegistrationState::Registered {
                    self.set_state(RegistrationState::Registered);
                }
                false
            }
            SubstrateEvent::Disconnected => {
                self.set_state(RegistrationState::Disconnected);
                // Background repair loop: fire-and-forget, nothing
                // caller-visible resolves or rejects here.
                self.registration.reconnect();
                self.set_state(RegistrationState::Reconnecting);
                false
            }
            SubstrateEvent::Error { fatal, message } => {
                eprintln!("[session] substrate error (fatal: {}): {}", fatal, message);
                matches!(
                    self.state,
                    RegistrationState::Disconnected | RegistrationState::Reconnecting
                )
            }
            SubstrateEvent::Connection { handle } => {
                let peer = handle.peer().to_string();
                // Accept unconditionally; roster membership waits for the
                // connection's own open acknowledgment.
                self.connections.insert(peer, handle);
                false
            }
            SubstrateEvent::ConnectionOpened { peer } => {
                if self.roster.insert(&peer) {
                    self.emit_roster();
                }
                false
            }
            SubstrateEvent::ConnectionClosed { peer } => {
                self.connections.remove(&peer);
                if self.roster.remove(&peer) {
                    self.emit_roster();
                }
                false
            }
            SubstrateEvent::Call { handle } => {
                // Always-on availability: answer immediately, no ringing
                handle.answer();
                let peer = handle.peer().to_string();
                if let Some(previous) = self.inbound_calls.insert(peer, handle) {
                    // A later call from the same token replaces the tracked
                    // session; close the old one so its media cannot leak
                    previous.close();
                }
                false
            }
            SubstrateEvent::CallStream { peer, stream } => {
                if self.inbound_calls.contains_key(&peer) {
                    self.emit(SessionEvent::StreamReceived { peer, stream });
                }
                false
            }
            SubstrateEvent::CallClosed { peer } => {
                // Stale outbound tracking for this peer is cleared too
                self.outbound_calls.remove(&peer);
                if self.inbound_calls.remove(&peer).is_some() {
                    self.emit(SessionEvent::StreamEnded { peer });
                }
                false
            }
        }
    }

    /// Kick the substrate's reconnect again after a failed attempt
    fn retry_reconnect(&mut self) {
        if self.destroyed || self.state == RegistrationState::Registered {
            return;
        }
        eprintln!("[session] retrying signaling reconnect");
        self.registration.reconnect();
        self.set_state(RegistrationState::Reconnecting);
    }

    /// Fan `stream` out to every current roster member
    fn broadcast_voice(&mut self, stream: MediaStream) {
        if self.destroyed {
            return;
        }

        if matches!(
            self.state,
            RegistrationState::Disconnected | RegistrationState::Reconnecting
        ) {
            // Best effort: kick the repair loop again, but never block or
            // queue the fan-out behind it. Unreachable members fail
            // individually.
            self.registration.reconnect();
            self.set_state(RegistrationState::Reconnecting);
        }

        for peer in self.roster.snapshot() {
            // At most one outbound call per member: a prior broadcast's
            // call handle is force-closed before the new call goes out
            if let Some(stale) = self.outbound_calls.remove(&peer) {
                stale.close();
            }
            match self.registration.call(&peer, &stream) {
                Ok(call) => {
                    self.outbound_calls.insert(peer, call);
                }
                Err(e) => {
                    // One member failing must never abort the others
                    eprintln!("[session] voice call to '{}' failed: {}", peer, e);
                }
            }
        }
    }

    /// Close every call this manager initiated. Idempotent.
    fn stop_broadcast(&mut self) {
        for (_, call) in self.outbound_calls.drain() {
            call.close();
        }
    }

    /// Open an outbound data connection to `remote`, skipping peers we
    /// already track and our own token
    fn connect_to(&mut self, remote: &str) {
        if self.destroyed
            || remote == self.token
            || self.roster.contains(remote)
            || self.connections.contains_key(remote)
        {
            return;
        }
        match self.registration.connect(remote) {
            Ok(handle) => {
                self.connections.insert(remote.to_string(), handle);
            }
            Err(e) => {
                eprintln!("[session] connection to '{}' failed: {}", remote, e);
            }
        }
    }

    /// Tear everything down. Idempotent; gates all later notifications.
    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.stop_broadcast();
        for (_, call) in self.inbound_calls.drain() {
            call.close();
        }
        for (_, conn) in self.connections.drain() {
            conn.close();
        }
        self.registration.destroy();
        self.roster.clear();
        self.set_state(RegistrationState::Destroyed);
    }
}
