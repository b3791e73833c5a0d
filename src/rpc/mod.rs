//! Abstract RPC channel to the location service.
//!
//! The service is shaped like GeoClue2: a manager hands out client
//! objects, a started client emits [`LocationUpdated`] signals whose paths
//! point at location objects, and location objects expose the raw
//! readings. A D-Bus transport implements these traits; the crate ships a
//! [`SimulatedProvider`] for tests and replay.

mod simulated;

pub use simulated::{CallLog, SimulatedProvider};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::position::AccuracyLevel;
use crate::Result;

/// Altitude value the service reports when no altitude is known.
pub const ALTITUDE_UNSET: f64 = f64::MIN;

/// Path of a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty and root paths mean "no object".
    pub fn is_unset(&self) -> bool {
        self.0.is_empty() || self.0 == "/"
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seconds and microseconds since the Unix epoch. `(0, 0)` means unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: u64,
    pub microseconds: u64,
}

impl Timestamp {
    pub fn new(seconds: u64, microseconds: u64) -> Self {
        Self {
            seconds,
            microseconds,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.seconds == 0 && self.microseconds == 0
    }
}

/// Raw properties of one location object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    /// [`ALTITUDE_UNSET`] when unknown.
    pub altitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
    /// Meters per second, negative when unknown.
    pub speed: f64,
    /// Degrees from north, negative when unknown.
    pub heading: f64,
    pub timestamp: Timestamp,
}

impl Default for LocationReading {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: ALTITUDE_UNSET,
            accuracy: 0.0,
            speed: -1.0,
            heading: -1.0,
            timestamp: Timestamp::default(),
        }
    }
}

impl LocationReading {
    /// Reading with only a coordinate set.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_timestamp(mut self, seconds: u64, microseconds: u64) -> Self {
        self.timestamp = Timestamp::new(seconds, microseconds);
        self
    }
}

/// `LocationUpdated(old, new)` signal of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationUpdated {
    pub old: ObjectPath,
    pub new: ObjectPath,
}

/// Manager-level operations of the location service.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Obtain a new client object.
    async fn create_client(&self) -> Result<Arc<dyn ClientProxy>>;

    /// Read all properties of the location object at `path`.
    async fn location(&self, path: &ObjectPath) -> Result<LocationReading>;

    /// Read the `AvailableAccuracyLevel` property.
    async fn available_accuracy_level(&self) -> Result<AccuracyLevel>;
}

/// One client object of the location service.
#[async_trait]
pub trait ClientProxy: Send + Sync {
    /// Object path of this client.
    fn path(&self) -> &ObjectPath;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn set_desktop_id(&self, desktop_id: &str) -> Result<()>;

    /// Minimum time between updates, in seconds.
    async fn set_time_threshold(&self, seconds: u32) -> Result<()>;

    async fn set_requested_accuracy_level(&self, level: AccuracyLevel) -> Result<()>;

    /// Path of the current location object; unset if none yet.
    async fn current_location(&self) -> Result<ObjectPath>;

    /// Subscribe to `LocationUpdated` signals.
    fn subscribe(&self) -> broadcast::Receiver<LocationUpdated>;
}
