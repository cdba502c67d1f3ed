//! Callsign sanitization
//!
//! Callsigns are free-form labels chosen by the user. They are embedded in
//! rendezvous tokens for human readability, so anything that is not ASCII
//! alphanumeric is dropped before the token is built. Sanitization never
//! fails; an all-symbol callsign simply sanitizes to the empty string.

/// Maximum length for callsigns in characters (after sanitization)
pub const MAX_CALLSIGN_LENGTH: usize = 16;

/// Strip a callsign down to the characters allowed inside a token
///
/// Keeps ASCII letters and digits, drops everything else (no replacement),
/// and truncates to [`MAX_CALLSIGN_LENGTH`]. Case is preserved.
pub fn sanitize_callsign(callsign: &str) -> String {
    callsign
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_CALLSIGN_LENGTH)
        .collect()
}
