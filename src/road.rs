use chrono::{DateTime, Utc};
use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::geo_point::GeoPoint;

/// A computed path between waypoints as returned by the routing service.
/// Treated as immutable once received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    /// Full resolution geometry, in travel order.
    pub route_high: Vec<GeoPoint>,
    pub length_in_meters: f64,
    pub duration_in_seconds: f64,
    pub legs: Vec<RoadLeg>,
    pub nodes: Vec<RoadNode>,
    pub received_at: DateTime<Utc>,
}

/// The part of a road between two consecutive waypoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadLeg {
    pub length_in_meters: f64,
    pub duration_in_seconds: f64,
}

/// A maneuver point along the road.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    pub location: GeoPoint,
    pub maneuver_type: String,
    pub maneuver_modifier: Option<String>,
    pub road_name: String,
    pub length_in_meters: f64,
    pub duration_in_seconds: f64,
}

impl Road {
    pub fn start(&self) -> Option<&GeoPoint> {
        self.route_high.first()
    }

    pub fn end(&self) -> Option<&GeoPoint> {
        self.route_high.last()
    }

    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        let first = self.route_high.first()?;
        let (mut min_lat, mut max_lat) = (first.latitude, first.latitude);
        let (mut min_lng, mut max_lng) = (first.longitude, first.longitude);
        for p in &self.route_high[1..] {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }
        Some(Rect::new(
            coord! { x: min_lng, y: min_lat },
            coord! { x: max_lng, y: max_lat },
        ))
    }
}
