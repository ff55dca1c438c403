//! Rest-Stop Routing
//!
//! Finds the closest reachable stop for a drowsy driver:
//! - Candidate search per stop category
//! - Route resolution per candidate
//! - Selection by shortest resolved route distance

mod gomaps;
mod place;
mod rerouter;

pub use gomaps::GoMapsClient;
pub use place::{Coordinates, Route, Stop};
pub use rerouter::{directions_url, FixedLocation, Geolocator, RerouteOutcome, Rerouter, RoutingProvider};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Routing errors
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Provider returned status {0}")]
    ProviderStatus(String),
    #[error("Malformed provider response: {0}")]
    Malformed(String),
    #[error("No route to destination")]
    NoRoute,
    #[error("No reachable stop found")]
    NoReachableStop,
    #[error("Location unavailable: {0}")]
    Location(String),
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        RoutingError::Http(err.to_string())
    }
}

/// Which routing backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// gomaps.pro Places + Directions
    Gomaps,
    /// Reroute requests are logged and skipped
    Disabled,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub provider: ProviderKind,
    /// Maps API base URL
    pub base_url: String,
    /// Maps API key, required for `gomaps`
    pub api_key: Option<String>,
    /// Fixed origin as "lat,lng" until a GPS source is wired in
    pub origin: String,
    /// Place categories searched independently
    pub categories: Vec<String>,
    /// Candidates kept per category
    pub per_category_limit: usize,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gomaps,
            base_url: "https://maps.gomaps.pro/maps/api".to_string(),
            api_key: None,
            origin: "19.107094,73.066216".to_string(),
            categories: vec!["gas_station".to_string(), "restaurant".to_string()],
            per_category_limit: 4,
            request_timeout_secs: 10,
        }
    }
}
