//! Normalized position records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rpc::{LocationReading, Timestamp, ALTITUDE_UNSET};

/// Geographic coordinate in WGS84 degrees, altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Latitude and longitude are in range and altitude, if any, is finite.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.altitude.map_or(true, f64::is_finite)
    }
}

/// One position fix. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
    /// Meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
    /// Meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_speed: Option<f64>,
    /// Degrees from true north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
}

impl PositionFix {
    /// Fix with only a coordinate and a timestamp.
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            timestamp,
            horizontal_accuracy: None,
            ground_speed: None,
            direction: None,
        }
    }

    /// Normalize a raw reading.
    ///
    /// `now` stamps readings whose timestamp is unspecified, and also
    /// readings whose timestamp does not fit a `DateTime`.
    pub fn from_reading(reading: &LocationReading, now: DateTime<Utc>) -> Self {
        let mut coordinate = Coordinate::new(reading.latitude, reading.longitude);
        if reading.altitude > ALTITUDE_UNSET {
            coordinate.altitude = Some(reading.altitude);
        }

        let timestamp = if reading.timestamp.is_unspecified() {
            now
        } else {
            timestamp_to_datetime(reading.timestamp).unwrap_or(now)
        };

        Self {
            coordinate,
            timestamp,
            horizontal_accuracy: Some(reading.accuracy),
            ground_speed: (reading.speed >= 0.0).then_some(reading.speed),
            direction: (reading.heading >= 0.0).then_some(reading.heading),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.coordinate.is_valid()
    }

    /// Copy that keeps only what is persisted: coordinate and timestamp.
    pub fn to_persisted(&self) -> Self {
        Self::new(self.coordinate, self.timestamp)
    }
}

/// Whole seconds plus whole milliseconds of the microsecond part.
fn timestamp_to_datetime(ts: Timestamp) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(ts.seconds).ok()?;
    let millis = i64::try_from(ts.microseconds / 1000).ok()?;
    let total = seconds.checked_mul(1000)?.checked_add(millis)?;
    DateTime::from_timestamp_millis(total)
}
