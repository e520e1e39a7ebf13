use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::{validate_waypoints, RoadManager, RouteFetchError};
use crate::config::MapConfig;
use crate::geo_point::{GeoPoint, Waypoint};
use crate::polyline;
use crate::road::{Road, RoadLeg, RoadNode};

const DEFAULT_OPTIONS: &str = "alternatives=true&overview=full&steps=true";
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Deserialize, Debug)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize, Debug)]
struct OsrmRoute {
    geometry: String,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize, Debug)]
struct OsrmLeg {
    distance: f64,
    duration: f64,
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize, Debug)]
struct OsrmStep {
    maneuver: OsrmManeuver,
    #[serde(default)]
    name: String,
    distance: f64,
    duration: f64,
}

#[derive(Deserialize, Debug)]
struct OsrmManeuver {
    // [longitude, latitude]
    location: [f64; 2],
    #[serde(rename = "type")]
    maneuver_type: String,
    modifier: Option<String>,
}

/// Client for an OSRM `route` service.
pub struct OsrmRoadManager {
    client: Client,
    service_url: String,
    user_agent: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OsrmRoadManager {
    pub fn new(
        service_url: &str,
        user_agent: &str,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, RouteFetchError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            service_url: service_url.to_string(),
            user_agent: user_agent.to_string(),
            max_retries,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        })
    }

    pub fn from_config(config: &MapConfig) -> Result<Self, RouteFetchError> {
        Self::new(
            &config.routing_service_url,
            &config.user_agent,
            config.request_timeout(),
            config.max_retries,
        )
    }

    pub fn with_retry_base_delay(mut self, retry_base_delay: Duration) -> Self {
        self.retry_base_delay = retry_base_delay;
        self
    }

    pub fn build_url(&self, waypoints: &[Waypoint]) -> String {
        let coordinates = waypoints
            .iter()
            .map(|p| format!("{},{}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/{}?{}",
            self.service_url.trim_end_matches('/'),
            coordinates,
            DEFAULT_OPTIONS
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<String, RouteFetchError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::OK {
            return Ok(body);
        }
        // OSRM reports bad queries (e.g. `InvalidQuery`, `NoSegment`) as 4xx
        // with its usual JSON body.
        if status.is_client_error() {
            if let Ok(OsrmResponse { code, message, .. }) = serde_json::from_str(&body) {
                return Err(RouteFetchError::Service {
                    code,
                    message: message.unwrap_or_default(),
                });
            }
        }
        Err(RouteFetchError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_base_delay.as_millis() as u64;
        let jitter = if base > 1 {
            rand::rng().random_range(0..base / 2)
        } else {
            0
        };
        Duration::from_millis(base * 2u64.pow(attempt.saturating_sub(1)) + jitter)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, RouteFetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "[osrm] attempt {} failed: {}, retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RoadManager for OsrmRoadManager {
    async fn get_roads(&self, waypoints: &[Waypoint]) -> Result<Vec<Road>, RouteFetchError> {
        validate_waypoints(waypoints)?;
        let url = self.build_url(waypoints);
        debug!("[osrm] GET {}", url);
        let body = self.fetch_with_retry(&url).await?;
        let roads = parse_response(&body)?;
        info!("[osrm] received {} road(s)", roads.len());
        Ok(roads)
    }
}

pub fn parse_response(body: &str) -> Result<Vec<Road>, RouteFetchError> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| RouteFetchError::MalformedResponse(e.to_string()))?;
    if response.code != "Ok" {
        return Err(RouteFetchError::Service {
            code: response.code,
            message: response.message.unwrap_or_default(),
        });
    }
    if response.routes.is_empty() {
        return Err(RouteFetchError::MalformedResponse(
            "no route in response".to_string(),
        ));
    }
    let received_at = Utc::now();
    response
        .routes
        .into_iter()
        .map(|route| {
            let route_high = polyline::decode(&route.geometry, polyline::DEFAULT_PRECISION)
                .map_err(|e| RouteFetchError::MalformedResponse(e.to_string()))?;
            if let Some(bad) = route_high.iter().find(|p| p.validate().is_err()) {
                return Err(RouteFetchError::MalformedResponse(format!(
                    "route geometry has an invalid point {:?}",
                    bad
                )));
            }
            if route_high.len() < 2 {
                return Err(RouteFetchError::MalformedResponse(format!(
                    "route geometry has {} point(s)",
                    route_high.len()
                )));
            }
            let nodes = route
                .legs
                .iter()
                .flat_map(|leg| leg.steps.iter())
                .map(|step| RoadNode {
                    location: GeoPoint::new(step.maneuver.location[1], step.maneuver.location[0]),
                    maneuver_type: step.maneuver.maneuver_type.clone(),
                    maneuver_modifier: step.maneuver.modifier.clone(),
                    road_name: step.name.clone(),
                    length_in_meters: step.distance,
                    duration_in_seconds: step.duration,
                })
                .collect();
            let legs = route
                .legs
                .iter()
                .map(|leg| RoadLeg {
                    length_in_meters: leg.distance,
                    duration_in_seconds: leg.duration,
                })
                .collect();
            Ok(Road {
                route_high,
                length_in_meters: route.distance,
                duration_in_seconds: route.duration,
                legs,
                nodes,
                received_at,
            })
        })
        .collect()
}
