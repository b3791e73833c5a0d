//! Accuracy levels and positioning method capabilities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reporting granularity of the location service.
///
/// Discriminants follow the GeoClue2 `GClueAccuracyLevel` numbering, which
/// is what goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum AccuracyLevel {
    #[default]
    None = 0,
    Country = 1,
    City = 4,
    Neighborhood = 5,
    Street = 6,
    Exact = 8,
}

impl AccuracyLevel {
    /// Decode a raw wire value. Unknown values yield `None`.
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Country),
            4 => Some(Self::City),
            5 => Some(Self::Neighborhood),
            6 => Some(Self::Street),
            8 => Some(Self::Exact),
            _ => None,
        }
    }

    /// Raw wire value.
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Coarse positioning capability, as requested by and reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositioningMethods {
    /// No positioning at all.
    None,
    /// Satellite (GNSS) grade positioning only.
    Satellite,
    /// Network/WiFi/IP based positioning only.
    NonSatellite,
    /// Any method.
    #[default]
    All,
}

impl PositioningMethods {
    /// Accuracy level to request from the service for these preferences.
    pub fn requested_accuracy(self) -> AccuracyLevel {
        match self {
            Self::Satellite | Self::All => AccuracyLevel::Exact,
            Self::NonSatellite => AccuracyLevel::Street,
            Self::None => AccuracyLevel::None,
        }
    }

    /// Capability implied by the service's available accuracy level.
    pub fn from_available(level: AccuracyLevel) -> Self {
        match level {
            AccuracyLevel::Country
            | AccuracyLevel::City
            | AccuracyLevel::Neighborhood
            | AccuracyLevel::Street => Self::NonSatellite,
            AccuracyLevel::Exact => Self::All,
            AccuracyLevel::None => Self::None,
        }
    }
}

impl fmt::Display for PositioningMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Satellite => "satellite",
            Self::NonSatellite => "non-satellite",
            Self::All => "all",
        };
        f.write_str(name)
    }
}

impl FromStr for PositioningMethods {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "satellite" => Ok(Self::Satellite),
            "non-satellite" | "nonsatellite" => Ok(Self::NonSatellite),
            "all" => Ok(Self::All),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_accuracy() {
        assert_eq!(
            PositioningMethods::Satellite.requested_accuracy(),
            AccuracyLevel::Exact
        );
        assert_eq!(
            PositioningMethods::NonSatellite.requested_accuracy(),
            AccuracyLevel::Street
        );
        assert_eq!(PositioningMethods::All.requested_accuracy(), AccuracyLevel::Exact);
        assert_eq!(PositioningMethods::None.requested_accuracy(), AccuracyLevel::None);
    }

    #[test]
    fn test_capability_from_available() {
        for level in [
            AccuracyLevel::Country,
            AccuracyLevel::City,
            AccuracyLevel::Neighborhood,
            AccuracyLevel::Street,
        ] {
            assert_eq!(
                PositioningMethods::from_available(level),
                PositioningMethods::NonSatellite
            );
        }
        assert_eq!(
            PositioningMethods::from_available(AccuracyLevel::Exact),
            PositioningMethods::All
        );
        assert_eq!(
            PositioningMethods::from_available(AccuracyLevel::None),
            PositioningMethods::None
        );
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(AccuracyLevel::Exact.as_raw(), 8);
        assert_eq!(AccuracyLevel::from_raw(6), Some(AccuracyLevel::Street));
        assert_eq!(AccuracyLevel::from_raw(2), None);
        assert_eq!(AccuracyLevel::from_raw(7), None);
    }

    #[test]
    fn test_ordering() {
        assert!(AccuracyLevel::None < AccuracyLevel::Country);
        assert!(AccuracyLevel::Street < AccuracyLevel::Exact);
    }

    #[test]
    fn test_methods_parse() {
        assert_eq!("all".parse::<PositioningMethods>(), Ok(PositioningMethods::All));
        assert_eq!(
            "Non-Satellite".parse::<PositioningMethods>(),
            Ok(PositioningMethods::NonSatellite)
        );
        assert!("gps".parse::<PositioningMethods>().is_err());
        assert_eq!(PositioningMethods::NonSatellite.to_string(), "non-satellite");
    }
}
