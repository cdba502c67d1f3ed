//! Rendezvous identity resolution
//!
//! Builds the opaque token a client registers with the rendezvous substrate:
//! `cl-<frequency>-<callsign>-<suffix>`. The frequency is embedded literally
//! so two tokens on the same channel share that segment, and the random
//! suffix makes each token unique per process-session. Identity is
//! per-session, not per-user: resolving the same inputs twice yields two
//! different tokens on purpose.

use crate::validators::sanitize_callsign;
use crate::{PEER_NAMESPACE, TOKEN_SUFFIX_LENGTH};

/// Alphabet for the random token suffix (base-36, lowercase)
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Resolve a (frequency, callsign) pair into a fresh rendezvous token
///
/// The callsign is sanitized to ASCII alphanumerics (an empty result is
/// fine), then joined with the namespace, frequency, and a random base-36
/// suffix. This is a pure function apart from the suffix draw; it cannot
/// fail.
///
/// # Examples
///
/// ```
/// use commlink_common::identity::resolve;
///
/// let token = resolve("144200", "MC WOLF");
/// assert!(token.starts_with("cl-144200-MCWOLF-"));
/// ```
pub fn resolve(frequency: &str, callsign: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        PEER_NAMESPACE,
        frequency,
        sanitize_callsign(callsign),
        random_suffix()
    )
}

/// Extract the frequency segment embedded in a token
///
/// Returns `None` if the token does not follow the
/// `cl-<frequency>-<callsign>-<suffix>` layout. Callers use this to check
/// whether a remote token belongs to the local channel.
pub fn frequency_of(token: &str) -> Option<&str> {
    let mut parts = token.split('-');
    if parts.next() != Some(PEER_NAMESPACE) {
        return None;
    }
    let frequency = parts.next()?;
    // Callsign (possibly empty) and suffix must both be present
    parts.next()?;
    parts.next()?;
    Some(frequency)
}

/// Draw a random base-36 suffix of [`TOKEN_SUFFIX_LENGTH`] characters
fn random_suffix() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    (0..TOKEN_SUFFIX_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
            SUFFIX_ALPHABET[idx] as char
        })
        .collect()
}
