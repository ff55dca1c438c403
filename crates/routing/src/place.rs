//! Places and routes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RoutingError;

/// WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

impl FromStr for Coordinates {
    type Err = RoutingError;

    /// Parse "lat,lng"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| RoutingError::InvalidCoordinates(s.to_string()))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| RoutingError::InvalidCoordinates(s.to_string()))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|_| RoutingError::InvalidCoordinates(s.to_string()))?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(RoutingError::InvalidCoordinates(s.to_string()));
        }
        Ok(Self { lat, lng })
    }
}

/// Candidate rest stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub location: Coordinates,
    /// Category it was found under, e.g. "gas_station"
    pub category: String,
}

/// Resolved driving route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub distance_m: u64,
    pub distance_text: String,
    pub duration_s: u64,
    pub duration_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let c: Coordinates = "19.107094, 73.066216".parse().unwrap();
        assert_eq!(c, Coordinates::new(19.107094, 73.066216));
        assert_eq!(c.to_string(), "19.107094,73.066216");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("19.1".parse::<Coordinates>().is_err());
        assert!("north,east".parse::<Coordinates>().is_err());
        assert!("91.0,0.0".parse::<Coordinates>().is_err());
    }
}
