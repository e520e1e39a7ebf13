//! Routing service client.

use async_trait::async_trait;
use thiserror::Error;

use crate::geo_point::Waypoint;
use crate::road::Road;

pub mod osrm;
pub use osrm::OsrmRoadManager;

#[derive(Error, Debug)]
pub enum RouteFetchError {
    #[error("invalid waypoints: {0}")]
    InvalidWaypoints(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("routing service returned HTTP {status}")]
    HttpStatus { status: u16, body: String },

    #[error("routing service error `{code}`: {message}")]
    Service { code: String, message: String },

    #[error("malformed routing response: {0}")]
    MalformedResponse(String),
}

impl RouteFetchError {
    /// Whether another attempt has a reasonable chance to succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Computes roads through an ordered list of waypoints. One road per
/// alternative offered by the service, best first.
#[async_trait]
pub trait RoadManager: Send + Sync + 'static {
    async fn get_roads(&self, waypoints: &[Waypoint]) -> Result<Vec<Road>, RouteFetchError>;
}

pub fn validate_waypoints(waypoints: &[Waypoint]) -> Result<(), RouteFetchError> {
    if waypoints.len() < 2 {
        return Err(RouteFetchError::InvalidWaypoints(format!(
            "at least 2 waypoints are required, got {}",
            waypoints.len()
        )));
    }
    for (i, waypoint) in waypoints.iter().enumerate() {
        waypoint
            .validate()
            .map_err(|e| RouteFetchError::InvalidWaypoints(format!("waypoint {i}: {e}")))?;
    }
    Ok(())
}
