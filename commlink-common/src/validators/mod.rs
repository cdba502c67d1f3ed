//! Input validation functions
//!
//! Reusable validators for user-supplied channel and identity input. The
//! presentation layer uses these for pre-validation before anything reaches
//! the session manager.

mod callsign;
mod frequency;

pub use callsign::{MAX_CALLSIGN_LENGTH, sanitize_callsign};
pub use frequency::{FrequencyError, random_frequency, validate_frequency};
