//! User preference settings
//!
//! The UI layer persists these between runs; missing or partial stored data
//! falls back to the defaults field by field.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CALLSIGN, DEFAULT_FREQUENCY};

/// Persisted radio preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Display callsign; sanitized before it enters a token
    #[serde(default = "default_callsign")]
    pub callsign: String,

    /// Last tuned channel frequency
    #[serde(default = "default_frequency")]
    pub frequency: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            callsign: DEFAULT_CALLSIGN.to_string(),
            frequency: DEFAULT_FREQUENCY.to_string(),
        }
    }
}

fn default_callsign() -> String {
    DEFAULT_CALLSIGN.to_string()
}

fn default_frequency() -> String {
    DEFAULT_FREQUENCY.to_string()
}
