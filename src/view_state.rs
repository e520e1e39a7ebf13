use anyhow::Result;

use crate::config::TileSource;
use crate::geo_point::GeoPoint;

/// Center and zoom of the map, owned by the UI layer.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    center: GeoPoint,
    zoom: f64,
    min_zoom: f64,
    max_zoom: f64,
    version: u64,
}

impl ViewState {
    pub fn new(center: GeoPoint, zoom: f64, tile_source: TileSource) -> Self {
        let min_zoom = tile_source.min_zoom();
        let max_zoom = tile_source.max_zoom();
        Self {
            center,
            zoom: zoom.clamp(min_zoom, max_zoom),
            min_zoom,
            max_zoom,
            version: 0,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_center(&mut self, center: GeoPoint) -> Result<()> {
        center.validate()?;
        if center != self.center {
            self.center = center;
            self.version = self.version.wrapping_add(1);
        }
        Ok(())
    }

    /// Clamped to the zoom range of the tile source. Returns the zoom in
    /// effect.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<f64> {
        if !zoom.is_finite() {
            bail!("invalid zoom: {}", zoom);
        }
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if zoom != self.zoom {
            self.zoom = zoom;
            self.version = self.version.wrapping_add(1);
        }
        Ok(zoom)
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
