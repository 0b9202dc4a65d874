//! Protocol message types for hub communication.

use chrono::{DateTime, Utc};
use roadwatch_core::MonitoringState;
use serde::{Deserialize, Serialize};

/// Messages sent by clients to the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness probe; answered with a pong to the sender only.
    Ping,

    /// Request the current monitoring state.
    GetStats,

    /// Turn monitoring on.
    StartMonitoring,

    /// Turn monitoring off.
    StopMonitoring,

    /// Any unrecognized `type` value, or an object with no usable
    /// `type` at all (see [`ClientMessage::parse`]).
    ///
    /// Deliberately a no-op for forward compatibility: no reply, no state
    /// change, the session stays open.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parses a client message from raw JSON.
    ///
    /// Any well-formed JSON object yields a message: an object whose
    /// `type` is missing or unrecognized maps to
    /// [`ClientMessage::Unknown`] rather than failing, so the session
    /// survives it. Input that is not a JSON object at all is a parse
    /// error.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str(raw) {
            Ok(msg) => Ok(msg),
            Err(err) => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Object(_)) => Ok(Self::Unknown),
                _ => Err(err),
            },
        }
    }

    /// Returns true if this message should be silently ignored.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Messages sent from the hub to clients, both as direct replies and as
/// broadcasts to every connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a ping.
    Pong {
        /// Server time when the ping was handled.
        timestamp: DateTime<Utc>,
    },

    /// Reply to a stats request.
    Stats {
        /// Consistent copy of the monitoring state at reply time.
        data: MonitoringState,
    },

    /// Monitoring was switched on (reply to the sender, or broadcast when
    /// triggered by a collaborator).
    MonitoringStarted {
        /// Human-readable note about who started monitoring.
        message: String,
    },

    /// Monitoring was switched off.
    MonitoringStopped {
        /// Human-readable note about who stopped monitoring.
        message: String,
    },
}

impl ServerMessage {
    /// Creates a pong reply stamped with the current time.
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now(),
        }
    }

    /// Creates a stats reply.
    pub fn stats(data: MonitoringState) -> Self {
        Self::Stats { data }
    }

    /// Creates a monitoring-started notification.
    pub fn monitoring_started(message: &str) -> Self {
        Self::MonitoringStarted {
            message: message.to_string(),
        }
    }

    /// Creates a monitoring-stopped notification.
    pub fn monitoring_stopped(message: &str) -> Self {
        Self::MonitoringStopped {
            message: message.to_string(),
        }
    }
}
