use anyhow::Result;
use geo_types::Coord;
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_IN_METERS: f64 = 6_371_008.8;

/// A geographic coordinate in degrees. Routing input and output, view center
/// and location marker all use this type.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Routing input. Same shape as any other point on the map.
pub type Waypoint = GeoPoint;

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            bail!("non-finite coordinate: {:?}", self);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            bail!("latitude out of range: {}", self.latitude);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            bail!("longitude out of range: {}", self.longitude);
        }
        Ok(())
    }

    pub fn distance_in_meters(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lng = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_IN_METERS * a.sqrt().asin()
    }

    pub fn approx_eq(&self, other: &GeoPoint, eps: f64) -> bool {
        (self.latitude - other.latitude).abs() <= eps
            && (self.longitude - other.longitude).abs() <= eps
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(p: GeoPoint) -> Self {
        Coord {
            x: p.longitude,
            y: p.latitude,
        }
    }
}

impl From<Coord<f64>> for GeoPoint {
    fn from(c: Coord<f64>) -> Self {
        GeoPoint::new(c.y, c.x)
    }
}
