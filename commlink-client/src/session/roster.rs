//! Live channel roster
//!
//! The roster is the arrival-ordered set of remote tokens that currently
//! have an open data connection to us. It never contains the local token.
//! Membership is mutated only by the session manager in response to
//! connection open/close events; everyone else sees snapshots.

/// Arrival-ordered set of currently connected remote tokens
#[derive(Debug, Default)]
pub struct Roster {
    members: Vec<String>,
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Add a token, keeping arrival order.
    ///
    /// Returns `true` if the roster changed. Duplicate opens from the same
    /// token collapse to a single entry (membership means "at least one open
    /// connection exists").
    pub fn insert(&mut self, token: &str) -> bool {
        if self.contains(token) {
            return false;
        }
        self.members.push(token.to_string());
        true
    }

    /// Remove a token. Returns `true` if the roster changed.
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|t| t != token);
        self.members.len() != before
    }

    /// Whether a token is currently a member
    pub fn contains(&self, token: &str) -> bool {
        self.members.iter().any(|t| t == token)
    }

    /// Immutable snapshot of the membership, in arrival order.
    ///
    /// This is what gets handed to the caller on every roster-changed
    /// notification, so external code never touches the live set.
    pub fn snapshot(&self) -> Vec<String> {
        self.members.clone()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop all members
    pub fn clear(&mut self) {
        self.members.clear();
    }
}
