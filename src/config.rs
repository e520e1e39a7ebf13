use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{Display, EnumString};

use crate::geo_point::GeoPoint;
use crate::preferences::{PreferenceStore, Setting};

pub const DEFAULT_ROUTING_SERVICE_URL: &str =
    "https://routing.openstreetmap.de/routed-car/route/v1/driving/";
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_CENTER: GeoPoint = GeoPoint::new(36.0, 10.25);
pub const DEFAULT_ZOOM: f64 = 9.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum TileSource {
    Mapnik,
    OpenTopo,
}

impl TileSource {
    pub fn min_zoom(&self) -> f64 {
        0.0
    }

    pub fn max_zoom(&self) -> f64 {
        match self {
            TileSource::Mapnik => 19.0,
            TileSource::OpenTopo => 17.0,
        }
    }
}

/// What to do with the route overlays of a previous fetch when a new result
/// arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum RouteOverlayPolicy {
    Replace,
    Accumulate,
}

/// Everything the map screen needs to know at startup. Built once (usually
/// from the preference store) and handed to the components that need it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub user_agent: String,
    pub tile_source: TileSource,
    pub tile_cache_dir: Option<String>,
    pub use_data_connection: bool,
    pub multi_touch_controls: bool,
    pub show_zoom_buttons: bool,
    pub initial_center: GeoPoint,
    pub initial_zoom: f64,
    pub routing_service_url: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub route_overlay_policy: RouteOverlayPolicy,
    pub location_accuracy_threshold: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            tile_source: TileSource::Mapnik,
            tile_cache_dir: None,
            use_data_connection: true,
            multi_touch_controls: true,
            show_zoom_buttons: false,
            initial_center: DEFAULT_CENTER,
            initial_zoom: DEFAULT_ZOOM,
            routing_service_url: DEFAULT_ROUTING_SERVICE_URL.to_string(),
            request_timeout_ms: 30_000,
            max_retries: 2,
            route_overlay_policy: RouteOverlayPolicy::Replace,
            location_accuracy_threshold: 50.0,
        }
    }
}

impl MapConfig {
    pub fn load(store: &PreferenceStore) -> MapConfig {
        let default = MapConfig::default();
        let tile_cache_dir: String =
            store.get_setting_with_default(Setting::TileCacheDir, String::new());
        let config = MapConfig {
            user_agent: store.get_setting_with_default(Setting::UserAgent, default.user_agent),
            tile_source: store.get_setting_with_default(Setting::TileSource, default.tile_source),
            tile_cache_dir: Some(tile_cache_dir).filter(|s| !s.is_empty()),
            use_data_connection: store
                .get_setting_with_default(Setting::UseDataConnection, default.use_data_connection),
            multi_touch_controls: store.get_setting_with_default(
                Setting::MultiTouchControls,
                default.multi_touch_controls,
            ),
            show_zoom_buttons: store
                .get_setting_with_default(Setting::ShowZoomButtons, default.show_zoom_buttons),
            initial_center: GeoPoint::new(
                store.get_setting_with_default(
                    Setting::CenterLatitude,
                    default.initial_center.latitude,
                ),
                store.get_setting_with_default(
                    Setting::CenterLongitude,
                    default.initial_center.longitude,
                ),
            ),
            initial_zoom: store.get_setting_with_default(Setting::Zoom, default.initial_zoom),
            routing_service_url: store
                .get_setting_with_default(Setting::RoutingServiceUrl, default.routing_service_url),
            request_timeout_ms: store
                .get_setting_with_default(Setting::RequestTimeoutMs, default.request_timeout_ms),
            max_retries: store.get_setting_with_default(Setting::MaxRetries, default.max_retries),
            route_overlay_policy: store.get_setting_with_default(
                Setting::RouteOverlayPolicy,
                default.route_overlay_policy,
            ),
            location_accuracy_threshold: store.get_setting_with_default(
                Setting::LocationAccuracyThreshold,
                default.location_accuracy_threshold,
            ),
        };
        let config = if config.initial_zoom.is_finite() {
            config
        } else {
            warn!("[config] ignoring stored zoom: {}", config.initial_zoom);
            MapConfig {
                initial_zoom: DEFAULT_ZOOM,
                ..config
            }
        };
        if let Err(e) = config.initial_center.validate() {
            warn!("[config] ignoring stored center: {}", e);
            return MapConfig {
                initial_center: DEFAULT_CENTER,
                ..config
            };
        }
        config
    }

    pub fn save(&self, store: &mut PreferenceStore) -> Result<()> {
        store.set_setting(Setting::UserAgent, &self.user_agent)?;
        store.set_setting(Setting::TileSource, self.tile_source)?;
        match &self.tile_cache_dir {
            Some(dir) => store.set_setting(Setting::TileCacheDir, dir)?,
            None => store.remove_setting(Setting::TileCacheDir)?,
        }
        store.set_setting(Setting::UseDataConnection, self.use_data_connection)?;
        store.set_setting(Setting::MultiTouchControls, self.multi_touch_controls)?;
        store.set_setting(Setting::ShowZoomButtons, self.show_zoom_buttons)?;
        store.set_setting(Setting::CenterLatitude, self.initial_center.latitude)?;
        store.set_setting(Setting::CenterLongitude, self.initial_center.longitude)?;
        store.set_setting(Setting::Zoom, self.initial_zoom)?;
        store.set_setting(Setting::RoutingServiceUrl, &self.routing_service_url)?;
        store.set_setting(Setting::RequestTimeoutMs, self.request_timeout_ms)?;
        store.set_setting(Setting::MaxRetries, self.max_retries)?;
        store.set_setting(Setting::RouteOverlayPolicy, self.route_overlay_policy)?;
        store.set_setting(
            Setting::LocationAccuracyThreshold,
            self.location_accuracy_threshold,
        )?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
