//! Connection liveness derived from the age of the latest reading.

use crate::store::{types::iso8601, Reading, ReadingStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Readings at most this old mean the phone is actively streaming.
pub const STREAMING_THRESHOLD_SECS: i64 = 10;

/// Readings at most this old (but past streaming) mean the phone is idle.
pub const IDLE_THRESHOLD_SECS: i64 = 60;

/// Three-state liveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Data is flowing
    Streaming,
    /// Connected recently, but the app may be paused or backgrounded
    Idle,
    /// No data, or nothing for over a minute
    Disconnected,
}

impl ConnectionState {
    /// Classify a reading by its age.
    pub fn from_age(age: Duration) -> Self {
        if age <= Duration::seconds(STREAMING_THRESHOLD_SECS) {
            ConnectionState::Streaming
        } else if age <= Duration::seconds(IDLE_THRESHOLD_SECS) {
            ConnectionState::Idle
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Streaming => "streaming",
            ConnectionState::Idle => "idle",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness report for one pairing code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Timestamp of the latest reading, `null` if there is none
    #[serde(with = "optional_iso8601")]
    pub last_seen: Option<DateTime<Utc>>,
    pub status: ConnectionState,
}

impl ConnectionStatus {
    /// Status for a code with no readings.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            last_seen: None,
            status: ConnectionState::Disconnected,
        }
    }
}

/// Evaluate liveness from the latest reading as of `now`.
pub fn evaluate(latest: Option<&Reading>, now: DateTime<Utc>) -> ConnectionStatus {
    let Some(reading) = latest else {
        return ConnectionStatus::disconnected();
    };

    let status = ConnectionState::from_age(now - reading.timestamp);
    ConnectionStatus {
        connected: status != ConnectionState::Disconnected,
        last_seen: Some(reading.timestamp),
        status,
    }
}

/// Evaluate liveness for `code` against the store's clock.
pub fn connection_status(store: &ReadingStore, code: &str) -> ConnectionStatus {
    evaluate(store.latest(code).as_ref(), store.now())
}

mod optional_iso8601 {
    use super::iso8601;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&iso8601::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
