//! Integration tests for the peer session manager
//!
//! These tests wire two or three managers to an in-memory hub substrate that
//! routes connections, calls, and streams between registered tokens, then
//! verify the full join/broadcast/leave exchange end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use commlink_client::{
    CallHandle, ConnectionHandle, MediaStream, RegisterConfig, RegistrationHandle, SessionEvent,
    SessionManager, Substrate, SubstrateError, SubstrateEvent,
};
use tokio::sync::mpsc;

// ============================================================================
// In-Memory Hub Substrate
// ============================================================================

type PeerDirectory = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<SubstrateEvent>>>>;

/// Routes substrate events between every registered token
#[derive(Debug, Default)]
struct HubSubstrate {
    peers: PeerDirectory,
}

impl HubSubstrate {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn send_to(peers: &PeerDirectory, token: &str, event: SubstrateEvent) {
        let sender = peers.lock().unwrap().get(token).cloned();
        if let Some(sender) = sender {
            let _ = sender.send(event);
        }
    }
}

impl Substrate for HubSubstrate {
    fn register(
        &self,
        token: &str,
        _config: &RegisterConfig,
        events: mpsc::UnboundedSender<SubstrateEvent>,
    ) -> Result<Box<dyn RegistrationHandle>, SubstrateError> {
        let _ = events.send(SubstrateEvent::Open {
            token: token.to_string(),
        });
        self.peers
            .lock()
            .unwrap()
            .insert(token.to_string(), events);
        Ok(Box::new(HubRegistration {
            token: token.to_string(),
            peers: self.peers.clone(),
        }))
    }
}

#[derive(Debug)]
struct HubRegistration {
    token: String,
    peers: PeerDirectory,
}

impl RegistrationHandle for HubRegistration {
    fn call(
        &self,
        remote: &str,
        stream: &MediaStream,
    ) -> Result<Box<dyn CallHandle>, SubstrateError> {
        if !self.peers.lock().unwrap().contains_key(remote) {
            return Err(SubstrateError::new(format!("unknown token '{}'", remote)));
        }
        // The callee sees the ringing call, then the media right behind it
        HubSubstrate::send_to(
            &self.peers,
            remote,
            SubstrateEvent::Call {
                handle: Box::new(HubCall {
                    local: remote.to_string(),
                    remote: self.token.clone(),
                    peers: self.peers.clone(),
                }),
            },
        );
        HubSubstrate::send_to(
            &self.peers,
            remote,
            SubstrateEvent::CallStream {
                peer: self.token.clone(),
                stream: stream.clone(),
            },
        );
        Ok(Box::new(HubCall {
            local: self.token.clone(),
            remote: remote.to_string(),
            peers: self.peers.clone(),
        }))
    }

    fn connect(&self, remote: &str) -> Result<Box<dyn ConnectionHandle>, SubstrateError> {
        if !self.peers.lock().unwrap().contains_key(remote) {
            return Err(SubstrateError::new(format!("unknown token '{}'", remote)));
        }
        HubSubstrate::send_to(
            &self.peers,
            remote,
            SubstrateEvent::Connection {
                handle: Box::new(HubConnection {
                    local: remote.to_string(),
                    remote: self.token.clone(),
                    peers: self.peers.clone(),
                }),
            },
        );
        HubSubstrate::send_to(
            &self.peers,
            remote,
            SubstrateEvent::ConnectionOpened {
                peer: self.token.clone(),
            },
        );
        HubSubstrate::send_to(
            &self.peers,
            &self.token,
            SubstrateEvent::ConnectionOpened {
                peer: remote.to_string(),
            },
        );
        Ok(Box::new(HubConnection {
            local: self.token.clone(),
            remote: remote.to_string(),
            peers: self.peers.clone(),
        }))
    }

    fn reconnect(&self) {}

    fn destroy(&self) {
        self.peers.lock().unwrap().remove(&self.token);
        // Everything this token held drops with it
        let others: Vec<String> = self.peers.lock().unwrap().keys().cloned().collect();
        for other in others {
            HubSubstrate::send_to(
                &self.peers,
                &other,
                SubstrateEvent::ConnectionClosed {
                    peer: self.token.clone(),
                },
            );
            HubSubstrate::send_to(
                &self.peers,
                &other,
                SubstrateEvent::CallClosed {
                    peer: self.token.clone(),
                },
            );
        }
    }
}

#[derive(Debug)]
struct HubConnection {
    local: String,
    remote: String,
    peers: PeerDirectory,
}

impl ConnectionHandle for HubConnection {
    fn peer(&self) -> &str {
        &self.remote
    }

    fn close(&self) {
        HubSubstrate::send_to(
            &self.peers,
            &self.remote,
            SubstrateEvent::ConnectionClosed {
                peer: self.local.clone(),
            },
        );
        HubSubstrate::send_to(
            &self.peers,
            &self.local,
            SubstrateEvent::ConnectionClosed {
                peer: self.remote.clone(),
            },
        );
    }
}

#[derive(Debug)]
struct HubCall {
    local: String,
    remote: String,
    peers: PeerDirectory,
}

impl CallHandle for HubCall {
    fn peer(&self) -> &str {
        &self.remote
    }

    fn answer(&self) {}

    fn close(&self) {
        HubSubstrate::send_to(
            &self.peers,
            &self.remote,
            SubstrateEvent::CallClosed {
                peer: self.local.clone(),
            },
        );
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Receive the next notification or fail the test after one second
async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("notification channel closed")
}

async fn join(
    hub: &Arc<HubSubstrate>,
    callsign: &str,
) -> (SessionManager, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = SessionManager::initialize(hub.clone(), "444222", callsign, tx)
        .await
        .expect("initialization failed");
    (manager, rx)
}

// ============================================================================
// End-to-End Exchange
// ============================================================================

#[tokio::test]
async fn test_join_broadcast_leave() {
    let hub = HubSubstrate::new();
    let (rookie, mut rookie_rx) = join(&hub, "ROOKIE").await;
    let (wolf, mut wolf_rx) = join(&hub, "WOLF").await;

    assert!(rookie.token().starts_with("cl-444222-ROOKIE-"));
    assert!(wolf.token().starts_with("cl-444222-WOLF-"));

    // WOLF discovers ROOKIE and connects; both rosters update
    wolf.connect_to(rookie.token());
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::RosterChanged(vec![rookie.token().to_string()])
    );
    assert_eq!(
        next_event(&mut rookie_rx).await,
        SessionEvent::RosterChanged(vec![wolf.token().to_string()])
    );

    // ROOKIE keys the mic; WOLF hears the stream
    let stream = MediaStream::new();
    rookie.broadcast_voice(stream.clone());
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::StreamReceived {
            peer: rookie.token().to_string(),
            stream,
        }
    );

    // ROOKIE releases the mic; WOLF's stream ends
    rookie.stop_broadcast();
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::StreamEnded {
            peer: rookie.token().to_string(),
        }
    );

    // ROOKIE leaves; WOLF's roster empties
    rookie.destroy();
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::RosterChanged(vec![])
    );
}

#[tokio::test]
async fn test_broadcast_reaches_every_member() {
    let hub = HubSubstrate::new();
    let (rookie, mut rookie_rx) = join(&hub, "ROOKIE").await;
    let (wolf, mut wolf_rx) = join(&hub, "WOLF").await;
    let (hawk, mut hawk_rx) = join(&hub, "HAWK").await;

    // Join one at a time so ROOKIE's roster order is fixed
    wolf.connect_to(rookie.token());
    assert_eq!(
        next_event(&mut rookie_rx).await,
        SessionEvent::RosterChanged(vec![wolf.token().to_string()])
    );
    hawk.connect_to(rookie.token());
    assert_eq!(
        next_event(&mut rookie_rx).await,
        SessionEvent::RosterChanged(vec![
            wolf.token().to_string(),
            hawk.token().to_string()
        ])
    );
    hawk.connect_to(wolf.token());

    let stream = MediaStream::new();
    rookie.broadcast_voice(stream.clone());

    for rx in [&mut wolf_rx, &mut hawk_rx] {
        // Skip the roster churn from the joins, keep the stream
        loop {
            match next_event(rx).await {
                SessionEvent::StreamReceived { peer, stream: got } => {
                    assert_eq!(peer, rookie.token());
                    assert_eq!(got, stream);
                    break;
                }
                SessionEvent::RosterChanged(_) => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }
}

#[tokio::test]
async fn test_rebroadcast_replaces_the_previous_stream() {
    let hub = HubSubstrate::new();
    let (rookie, mut rookie_rx) = join(&hub, "ROOKIE").await;
    let (wolf, mut wolf_rx) = join(&hub, "WOLF").await;

    wolf.connect_to(rookie.token());
    let _ = next_event(&mut wolf_rx).await;
    // ROOKIE must see WOLF on its roster before keying the mic
    let _ = next_event(&mut rookie_rx).await;

    let first = MediaStream::new();
    rookie.broadcast_voice(first.clone());
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::StreamReceived {
            peer: rookie.token().to_string(),
            stream: first,
        }
    );

    // A second key-down closes the stale call before placing the new one
    let second = MediaStream::new();
    rookie.broadcast_voice(second.clone());
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::StreamEnded {
            peer: rookie.token().to_string(),
        }
    );
    assert_eq!(
        next_event(&mut wolf_rx).await,
        SessionEvent::StreamReceived {
            peer: rookie.token().to_string(),
            stream: second,
        }
    );
}

#[tokio::test]
async fn test_same_callsign_peers_are_distinct() {
    let hub = HubSubstrate::new();
    let (first, _first_rx) = join(&hub, "ROOKIE").await;
    let (second, mut second_rx) = join(&hub, "ROOKIE").await;

    assert_ne!(first.token(), second.token());

    // Distinct tokens mean both registrations are routable
    second.connect_to(first.token());
    assert_eq!(
        next_event(&mut second_rx).await,
        SessionEvent::RosterChanged(vec![first.token().to_string()])
    );
}

#[tokio::test]
async fn test_destroyed_session_goes_quiet() {
    let hub = HubSubstrate::new();
    let (rookie, mut rookie_rx) = join(&hub, "ROOKIE").await;
    let (wolf, mut wolf_rx) = join(&hub, "WOLF").await;

    wolf.connect_to(rookie.token());
    let _ = next_event(&mut rookie_rx).await;
    let _ = next_event(&mut wolf_rx).await;

    wolf.destroy();

    // ROOKIE observes the departure; WOLF's own channel just closes
    assert_eq!(
        next_event(&mut rookie_rx).await,
        SessionEvent::RosterChanged(vec![])
    );
    let quiet = tokio::time::timeout(Duration::from_secs(1), wolf_rx.recv())
        .await
        .expect("timed out waiting for the channel to close");
    assert_eq!(quiet, None);
}
