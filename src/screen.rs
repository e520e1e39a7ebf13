use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::background::BackgroundPool;
use crate::config::MapConfig;
use crate::geo_point::{GeoPoint, Waypoint};
use crate::location::LocationProvider;
use crate::looper::Looper;
use crate::map_view::{MapCanvas, MapViewEnv, MapViewHost, MapViewState};
use crate::preferences::PreferenceStore;
use crate::route_fetcher::RouteFetcher;
use crate::routing::{OsrmRoadManager, RoadManager};

/// Route drawn when the screen starts.
pub const DEFAULT_ROUTE: [Waypoint; 2] = [
    GeoPoint::new(36.84924, 10.19023),
    GeoPoint::new(36.8586, 10.2662),
];

/// The map screen: one map view, the interactive thread's looper, and the
/// background pool its route fetches run on.
///
/// Must be created and driven from the interactive thread.
pub struct NavigationScreen {
    // dropped first so in-flight tasks are aborted before the pool goes away
    host: MapViewHost,
    looper: Looper<MapViewHost>,
    background: BackgroundPool,
    road_manager: Arc<dyn RoadManager>,
    config: MapConfig,
}

impl NavigationScreen {
    pub fn new(config: MapConfig, road_manager: Arc<dyn RoadManager>) -> Result<Self> {
        let background = BackgroundPool::new(None)?;
        Ok(Self {
            host: MapViewHost::new(&config),
            looper: Looper::prepare(),
            background,
            road_manager,
            config,
        })
    }

    /// Loads the config from the preference store in `support_dir` and talks
    /// to the configured OSRM service.
    pub fn from_preferences(support_dir: &str) -> Result<Self> {
        let store = PreferenceStore::open(support_dir)?;
        let config = MapConfig::load(&store);
        info!(
            "[screen] tile source: {}, routing service: {}",
            config.tile_source, config.routing_service_url
        );
        let road_manager = OsrmRoadManager::from_config(&config)?;
        Self::new(config, Arc::new(road_manager))
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn host(&self) -> &MapViewHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut MapViewHost {
        &mut self.host
    }

    /// Attaches the map view to its renderer and location provider, then
    /// starts fetching the default route.
    pub fn start(
        &mut self,
        canvas: Box<dyn MapCanvas>,
        location_provider: Box<dyn LocationProvider>,
    ) -> Result<u64> {
        let env = MapViewEnv {
            main: self.looper.handle(),
            route_fetcher: RouteFetcher::new(self.road_manager.clone(), self.background.handle()),
            location_provider,
        };
        self.host.attach(canvas, env)?;
        self.host.render()?;
        self.host.request_route(DEFAULT_ROUTE.to_vec())
    }

    pub fn request_route(&mut self, waypoints: Vec<Waypoint>) -> Result<u64> {
        self.host.request_route(waypoints)
    }

    fn render_if_active(&mut self) -> Result<()> {
        if self.host.state() == MapViewState::Active {
            self.host.render()?;
        }
        Ok(())
    }

    /// Runs queued work (merges, location updates) and renders. Never blocks.
    pub fn pump(&mut self) -> Result<usize> {
        let count = self.looper.run_pending(&mut self.host)?;
        self.render_if_active()?;
        Ok(count)
    }

    /// Like `pump`, but waits up to `timeout` for `done` to hold.
    pub fn pump_until<P>(&mut self, timeout: Duration, done: P) -> Result<bool>
    where
        P: FnMut(&MapViewHost) -> bool,
    {
        let satisfied = self.looper.run_until(&mut self.host, timeout, done)?;
        self.render_if_active()?;
        Ok(satisfied)
    }

    pub fn dispose(&mut self) {
        self.host.dispose();
        // let late results find a disposed host and be dropped
        if let Err(e) = self.looper.run_pending(&mut self.host) {
            warn!("[screen] failed to drain looper: {}", e);
        }
    }
}
