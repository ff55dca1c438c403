//! gomaps.pro Places and Directions client

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::place::{Coordinates, Route, Stop};
use crate::rerouter::RoutingProvider;
use crate::{RoutingConfig, RoutingError};

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    name: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    distance: TextValue,
    duration: TextValue,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    value: u64,
}

/// HTTP client for the gomaps.pro Maps API
pub struct GoMapsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoMapsClient {
    /// Create a client; fails without an API key
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RoutingError::ProviderStatus("missing API key".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<serde_json::Value, RoutingError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("key", self.api_key.clone()));

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Parse a nearbysearch body into stops of `category`
fn parse_nearby(body: serde_json::Value, category: &str, limit: usize) -> Result<Vec<Stop>, RoutingError> {
    let parsed: NearbyResponse =
        serde_json::from_value(body).map_err(|e| RoutingError::Malformed(e.to_string()))?;

    match parsed.status.as_str() {
        "OK" | "ZERO_RESULTS" | "" => {}
        other => return Err(RoutingError::ProviderStatus(other.to_string())),
    }

    Ok(parsed
        .results
        .into_iter()
        .take(limit)
        .map(|place| Stop {
            name: place.name,
            location: place.geometry.location,
            category: category.to_string(),
        })
        .collect())
}

/// Parse a directions body into the first leg of the first route
fn parse_directions(body: serde_json::Value) -> Result<Route, RoutingError> {
    let parsed: DirectionsResponse =
        serde_json::from_value(body).map_err(|e| RoutingError::Malformed(e.to_string()))?;

    if !parsed.status.is_empty() && parsed.status != "OK" && parsed.status != "ZERO_RESULTS" {
        return Err(RoutingError::ProviderStatus(parsed.status));
    }

    let leg = parsed
        .routes
        .into_iter()
        .next()
        .and_then(|route| route.legs.into_iter().next())
        .ok_or(RoutingError::NoRoute)?;

    Ok(Route {
        distance_m: leg.distance.value,
        distance_text: leg.distance.text,
        duration_s: leg.duration.value,
        duration_text: leg.duration.text,
    })
}

#[async_trait]
impl RoutingProvider for GoMapsClient {
    async fn nearby_stops(
        &self,
        origin: Coordinates,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Stop>, RoutingError> {
        let body = self
            .get_json(
                "place/nearbysearch/json",
                &[
                    ("location", origin.to_string()),
                    ("rankby", "distance".to_string()),
                    ("type", category.to_string()),
                ],
            )
            .await?;
        parse_nearby(body, category, limit)
    }

    async fn route(&self, origin: Coordinates, destination: Coordinates) -> Result<Route, RoutingError> {
        let body = self
            .get_json(
                "directions/json",
                &[
                    ("origin", origin.to_string()),
                    ("destination", destination.to_string()),
                    ("mode", "driving".to_string()),
                ],
            )
            .await?;
        parse_directions(body)
    }
}
