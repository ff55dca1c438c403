//! Nearest-stop selection

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::place::{Coordinates, Route, Stop};
use crate::{RoutingConfig, RoutingError};

/// Place search and route resolution backend
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Stops of one category near `origin`, closest first
    async fn nearby_stops(
        &self,
        origin: Coordinates,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Stop>, RoutingError>;

    /// Driving route from `origin` to `destination`
    async fn route(&self, origin: Coordinates, destination: Coordinates) -> Result<Route, RoutingError>;
}

/// Source of the vehicle's current position
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, RoutingError>;
}

/// Always reports the same position
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl Geolocator for FixedLocation {
    async fn locate(&self) -> Result<Coordinates, RoutingError> {
        Ok(self.0)
    }
}

/// The stop chosen for a reroute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouteOutcome {
    pub origin: Coordinates,
    pub stop: Stop,
    pub route: Route,
    pub directions_url: String,
}

/// Google Maps directions link from `origin` to `destination`
pub fn directions_url(origin: Coordinates, destination: Coordinates) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&origin={}&destination={}&travelmode=driving",
        origin, destination
    )
}

/// Finds the closest reachable stop across categories
pub struct Rerouter {
    provider: Arc<dyn RoutingProvider>,
    locator: Arc<dyn Geolocator>,
    categories: Vec<String>,
    per_category_limit: usize,
}

impl Rerouter {
    pub fn new(
        provider: Arc<dyn RoutingProvider>,
        locator: Arc<dyn Geolocator>,
        config: &RoutingConfig,
    ) -> Self {
        Self {
            provider,
            locator,
            categories: config.categories.clone(),
            per_category_limit: config.per_category_limit,
        }
    }

    /// Search every category, resolve a route to each candidate and keep the
    /// shortest. Candidates whose route fails are excluded, never scored as 0.
    pub async fn nearest_stop(&self) -> Result<RerouteOutcome, RoutingError> {
        let origin = self.locator.locate().await?;
        info!("Searching rest stops near {}", origin);

        let mut candidates = Vec::new();
        for category in &self.categories {
            match self
                .provider
                .nearby_stops(origin, category, self.per_category_limit)
                .await
            {
                Ok(mut stops) => {
                    stops.truncate(self.per_category_limit);
                    debug!("{} candidates for {}", stops.len(), category);
                    candidates.extend(stops);
                }
                Err(e) => warn!("Stop search for {} failed: {}", category, e),
            }
        }

        let mut nearest: Option<(Stop, Route)> = None;
        for stop in candidates {
            match self.provider.route(origin, stop.location).await {
                Ok(route) => {
                    let closer = nearest
                        .as_ref()
                        .map_or(true, |(_, best)| route.distance_m < best.distance_m);
                    if closer {
                        nearest = Some((stop, route));
                    }
                }
                Err(e) => debug!("Excluding {}: {}", stop.name, e),
            }
        }

        let (stop, route) = nearest.ok_or(RoutingError::NoReachableStop)?;
        info!(
            "Nearest stop: {} ({}) {} | ETA {}",
            stop.name, stop.category, route.distance_text, route.duration_text
        );

        Ok(RerouteOutcome {
            origin,
            directions_url: directions_url(origin, stop.location),
            stop,
            route,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeProvider {
        stops: HashMap<String, Vec<Stop>>,
        /// Route distance by stop name; missing means the route fails
        distances: HashMap<String, u64>,
    }

    #[async_trait]
    impl RoutingProvider for FakeProvider {
        async fn nearby_stops(
            &self,
            _origin: Coordinates,
            category: &str,
            _limit: usize,
        ) -> Result<Vec<Stop>, RoutingError> {
            self.stops
                .get(category)
                .cloned()
                .ok_or_else(|| RoutingError::ProviderStatus("REQUEST_DENIED".into()))
        }

        async fn route(&self, _origin: Coordinates, destination: Coordinates) -> Result<Route, RoutingError> {
            let name = self
                .stops
                .values()
                .flatten()
                .find(|s| s.location == destination)
                .map(|s| s.name.clone())
                .ok_or(RoutingError::NoRoute)?;
            let distance_m = *self.distances.get(&name).ok_or(RoutingError::NoRoute)?;
            Ok(Route {
                distance_m,
                distance_text: format!("{distance_m} m"),
                duration_s: distance_m / 10,
                duration_text: "soon".into(),
            })
        }
    }

    fn stop(name: &str, category: &str, lat: f64) -> Stop {
        Stop {
            name: name.into(),
            location: Coordinates::new(lat, 73.0),
            category: category.into(),
        }
    }

    fn rerouter(provider: FakeProvider, config: &RoutingConfig) -> Rerouter {
        Rerouter::new(
            Arc::new(provider),
            Arc::new(FixedLocation(Coordinates::new(19.0, 73.0))),
            config,
        )
    }

    #[tokio::test]
    async fn test_picks_shortest_resolved_route_across_categories() {
        let provider = FakeProvider {
            stops: HashMap::from([
                ("gas_station".to_string(), vec![stop("Fuel A", "gas_station", 19.1), stop("Fuel B", "gas_station", 19.2)]),
                ("restaurant".to_string(), vec![stop("Diner", "restaurant", 19.3)]),
            ]),
            distances: HashMap::from([
                ("Fuel A".to_string(), 4_000),
                ("Diner".to_string(), 1_500),
            ]),
        };

        let outcome = rerouter(provider, &RoutingConfig::default()).nearest_stop().await.unwrap();
        assert_eq!(outcome.stop.name, "Diner");
        assert_eq!(outcome.route.distance_m, 1_500);
        assert!(outcome.directions_url.contains("destination=19.3,73"));
    }

    #[tokio::test]
    async fn test_unresolvable_routes_are_excluded_not_zero() {
        // "Fuel B" has no route; it must not win as distance 0
        let provider = FakeProvider {
            stops: HashMap::from([(
                "gas_station".to_string(),
                vec![stop("Fuel B", "gas_station", 19.2), stop("Fuel A", "gas_station", 19.1)],
            )]),
            distances: HashMap::from([("Fuel A".to_string(), 9_000)]),
        };

        let outcome = rerouter(provider, &RoutingConfig::default()).nearest_stop().await.unwrap();
        assert_eq!(outcome.stop.name, "Fuel A");
    }

    #[tokio::test]
    async fn test_all_routes_failing_is_no_reachable_stop() {
        let provider = FakeProvider {
            stops: HashMap::from([("gas_station".to_string(), vec![stop("Fuel A", "gas_station", 19.1)])]),
            distances: HashMap::new(),
        };

        let err = rerouter(provider, &RoutingConfig::default()).nearest_stop().await.unwrap_err();
        assert!(matches!(err, RoutingError::NoReachableStop));
    }

    #[tokio::test]
    async fn test_per_category_limit_truncates() {
        let provider = FakeProvider {
            stops: HashMap::from([(
                "gas_station".to_string(),
                vec![stop("Near", "gas_station", 19.1), stop("Far but short", "gas_station", 19.2)],
            )]),
            distances: HashMap::from([
                ("Near".to_string(), 5_000),
                ("Far but short".to_string(), 100),
            ]),
        };
        let config = RoutingConfig {
            per_category_limit: 1,
            ..Default::default()
        };

        let outcome = rerouter(provider, &config).nearest_stop().await.unwrap();
        assert_eq!(outcome.stop.name, "Near");
    }
}
