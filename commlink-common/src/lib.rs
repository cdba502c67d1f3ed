//! Commlink Common Library
//!
//! Shared constants, validators, and identity handling for the Commlink
//! push-to-talk system.

pub mod identity;
pub mod preferences;
pub mod validators;

/// Namespace prefix embedded in every rendezvous token.
///
/// Tokens look like `cl-<frequency>-<callsign>-<suffix>`, so two tokens
/// sharing a frequency segment are on the same channel by construction.
pub const PEER_NAMESPACE: &str = "cl";

/// Number of digits in a frequency (channel) code
pub const FREQUENCY_LENGTH: usize = 6;

/// Default frequency shown before the user picks one
pub const DEFAULT_FREQUENCY: &str = "144200";

/// Default callsign for users who never set one
pub const DEFAULT_CALLSIGN: &str = "ROOKIE";

/// Length of the random base-36 suffix appended to every token
pub const TOKEN_SUFFIX_LENGTH: usize = 4;

/// Public relay-assist endpoints used for connectivity negotiation.
///
/// Passed to the rendezvous substrate at registration time. These carry no
/// media; they only help peers discover routable addresses.
pub const DEFAULT_RELAY_ENDPOINTS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:global.stun.twilio.com:3478",
];
