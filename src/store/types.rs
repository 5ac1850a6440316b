//! Value types handed out by the reading store.
//!
//! Everything here is an owned snapshot; nothing borrows into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest heart-rate zone.
pub const MIN_ZONE: u8 = 1;
/// Highest heart-rate zone.
pub const MAX_ZONE: u8 = 5;

/// A single heart-rate sample as received from the phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Beats per minute
    pub bpm: u16,
    /// Intensity zone (1-5), computed on the phone
    pub zone: u8,
    /// When the server received the reading
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

/// Reading counts per zone, always holding all five zones.
///
/// Counts are readings, not seconds. At the phone's ~1 Hz send rate the two
/// are interchangeable, which is what clients assume when they label them
/// as seconds.
pub type ZoneCounts = BTreeMap<u8, u32>;

/// Aggregate over the readings in a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateStats {
    /// Mean BPM, rounded to the nearest integer
    pub avg: u16,
    pub min: u16,
    pub max: u16,
    /// Number of readings in the window
    pub count: usize,
    pub time_in_zone: ZoneCounts,
}

impl HeartRateStats {
    /// Aggregate a slice of readings. Returns `None` for an empty slice.
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }

        let mut time_in_zone: ZoneCounts = (MIN_ZONE..=MAX_ZONE).map(|z| (z, 0)).collect();
        let mut sum: u64 = 0;
        let mut min = u16::MAX;
        let mut max = u16::MIN;

        for reading in readings {
            sum += u64::from(reading.bpm);
            min = min.min(reading.bpm);
            max = max.max(reading.bpm);
            if let Some(count) = time_in_zone.get_mut(&reading.zone) {
                *count += 1;
            }
        }

        let avg = (sum as f64 / readings.len() as f64).round() as u16;

        Some(Self {
            avg,
            min,
            max,
            count: readings.len(),
            time_in_zone,
        })
    }
}

/// What a sweep pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub readings_removed: usize,
    pub sessions_removed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.readings_removed == 0 && self.sessions_removed == 0
    }
}

/// Serde support for timestamps as RFC 3339 with millisecond precision.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
