//! Shared monitoring state record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide monitoring state, owned by the registry.
///
/// `total_connections` always mirrors the size of the registry's live
/// connection set; it is recomputed on every register/unregister and never
/// mutated independently. `last_update` moves forward on every mutation of
/// either field and is monotonically non-decreasing.
///
/// The serde representation is the external one:
/// `{"total_connections": 0, "is_monitoring": false, "last_update": null}`
/// with `last_update` as an RFC 3339 string once set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringState {
    /// Number of currently registered connections.
    pub total_connections: usize,

    /// Whether monitoring is active.
    pub is_monitoring: bool,

    /// Time of the last mutation; `None` until the first one.
    pub last_update: Option<DateTime<Utc>>,
}

impl MonitoringState {
    /// Creates the initial state: no connections, monitoring off, never
    /// updated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the monitoring flag and records the mutation time.
    pub fn set_monitoring(&mut self, active: bool) {
        self.is_monitoring = active;
        self.touch();
    }

    /// Sets the connection count and records the mutation time.
    pub fn set_connection_count(&mut self, count: usize) {
        self.total_connections = count;
        self.touch();
    }

    /// Advances `last_update` to now, never moving it backwards.
    fn touch(&mut self) {
        let now = Utc::now();
        match self.last_update {
            Some(prev) if prev > now => {}
            _ => self.last_update = Some(now),
        }
    }
}
