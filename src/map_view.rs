use anyhow::Result;
use std::thread;

use crate::config::{MapConfig, RouteOverlayPolicy};
use crate::geo_point::{GeoPoint, Waypoint};
use crate::location::{FixResult, LocationFilter, LocationFix, LocationProvider};
use crate::looper::MainHandle;
use crate::overlay::{MyLocationOverlay, Overlay, OverlaySet, RoadOverlay};
use crate::road::Road;
use crate::route_fetcher::{RouteFetcher, RouteResult};
use crate::routing::{self, RouteFetchError};
use crate::task_scope::TaskScope;
use crate::view_state::ViewState;

/// The external map renderer. Lives on the interactive thread.
pub trait MapCanvas {
    fn set_center(&mut self, center: GeoPoint);
    fn set_zoom(&mut self, zoom: f64);
    fn set_overlays(&mut self, overlays: &[Overlay]);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MapViewState {
    Uninitialized,
    Active,
    Disposed,
}

/// Collaborators a map view needs once it is attached to a renderer.
pub struct MapViewEnv {
    pub main: MainHandle<MapViewHost>,
    pub route_fetcher: RouteFetcher,
    pub location_provider: Box<dyn LocationProvider>,
}

struct Attached {
    canvas: Box<dyn MapCanvas>,
    env: MapViewEnv,
    // versions last pushed into `canvas`, `None` before the first render
    rendered_view_version: Option<u64>,
    rendered_overlays_version: Option<u64>,
}

/// Owns the view state and the overlays of one map, and merges route results
/// into them. All methods must be called on the thread that created it.
pub struct MapViewHost {
    state: MapViewState,
    view: ViewState,
    overlays: OverlaySet,
    route_overlay_policy: RouteOverlayPolicy,
    location_filter: LocationFilter,
    tasks: TaskScope,
    attached: Option<Attached>,
    // generation of the newest route request, of the newest result handled
    // (success or failure), and of the newest one drawn
    requested_generation: u64,
    resolved_generation: u64,
    merged_generation: u64,
    roads: Vec<Road>,
    last_route_error: Option<RouteFetchError>,
}

impl MapViewHost {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            state: MapViewState::Uninitialized,
            view: ViewState::new(config.initial_center, config.initial_zoom, config.tile_source),
            overlays: OverlaySet::new(),
            route_overlay_policy: config.route_overlay_policy,
            location_filter: LocationFilter::new(config.location_accuracy_threshold),
            tasks: TaskScope::new(),
            attached: None,
            requested_generation: 0,
            resolved_generation: 0,
            merged_generation: 0,
            roads: Vec::new(),
            last_route_error: None,
        }
    }

    pub fn state(&self) -> MapViewState {
        self.state
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn center(&self) -> GeoPoint {
        self.view.center()
    }

    pub fn zoom(&self) -> f64 {
        self.view.zoom()
    }

    pub fn set_center(&mut self, center: GeoPoint) -> Result<()> {
        self.view.set_center(center)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<f64> {
        self.view.set_zoom(zoom)
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    /// Roads of the newest merged route result.
    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn last_route_error(&self) -> Option<&RouteFetchError> {
        self.last_route_error.as_ref()
    }

    /// Generation of the newest route result shown, 0 before the first.
    pub fn merged_generation(&self) -> u64 {
        self.merged_generation
    }

    /// Generation of the newest route result handled, successful or not.
    pub fn resolved_generation(&self) -> u64 {
        self.resolved_generation
    }

    pub fn in_flight_tasks(&self) -> usize {
        self.tasks.active_count()
    }

    fn check_active(&self) -> Result<()> {
        if self.state != MapViewState::Active {
            bail!("map view is {:?}", self.state);
        }
        Ok(())
    }

    /// Binds the view to its renderer: installs the location overlay and
    /// starts location updates.
    pub fn attach(&mut self, canvas: Box<dyn MapCanvas>, mut env: MapViewEnv) -> Result<()> {
        if self.state != MapViewState::Uninitialized {
            bail!("cannot attach a map view that is {:?}", self.state);
        }

        let main = env.main.clone();
        env.location_provider.start(Box::new(move |fixes: Vec<LocationFix>| {
            if main.post(move |host| host.on_location_update(fixes)).is_err() {
                debug!("[map_view] interactive thread is gone, dropping location update");
            }
        }))?;

        let mut my_location = MyLocationOverlay::new();
        my_location.enable_my_location();
        my_location.enable_follow_location();
        if let Err(e) = self.overlays.add(Overlay::MyLocation(my_location)) {
            env.location_provider.stop();
            return Err(e);
        }

        self.attached = Some(Attached {
            canvas,
            env,
            rendered_view_version: None,
            rendered_overlays_version: None,
        });
        self.state = MapViewState::Active;
        info!("[map_view] attached");
        Ok(())
    }

    /// Pushes whatever changed since the last pass into the renderer.
    pub fn render(&mut self) -> Result<()> {
        self.check_active()?;
        let attached = match self.attached.as_mut() {
            Some(attached) => attached,
            None => bail!("active map view without renderer"),
        };
        if attached.rendered_view_version != Some(self.view.version()) {
            attached.canvas.set_center(self.view.center());
            attached.canvas.set_zoom(self.view.zoom());
            attached.rendered_view_version = Some(self.view.version());
        }
        if attached.rendered_overlays_version != Some(self.overlays.version()) {
            attached.canvas.set_overlays(self.overlays.as_slice());
            attached.rendered_overlays_version = Some(self.overlays.version());
        }
        Ok(())
    }

    /// Starts fetching a route through `waypoints` in the background. The
    /// result is merged later, when the interactive thread drains its looper.
    /// Returns the generation of the request.
    pub fn request_route(&mut self, waypoints: Vec<Waypoint>) -> Result<u64> {
        self.check_active()?;
        routing::validate_waypoints(&waypoints)?;
        let attached = match self.attached.as_ref() {
            Some(attached) => attached,
            None => bail!("active map view without renderer"),
        };

        self.requested_generation += 1;
        let generation = self.requested_generation;
        debug!(
            "[map_view] requesting route #{} through {} waypoints",
            generation,
            waypoints.len()
        );
        let abort_handle = attached.env.route_fetcher.fetch(
            waypoints,
            attached.env.main.clone(),
            move |host: &mut MapViewHost, result| {
                if let Err(e) = host.merge_routes(generation, result) {
                    error!("[map_view] failed to merge route #{}: {}", generation, e);
                }
            },
        );
        self.tasks.register(abort_handle)?;
        Ok(generation)
    }

    /// Applies the result of route request `generation`. Returns the number of
    /// overlays added.
    pub fn merge_routes(&mut self, generation: u64, result: RouteResult) -> Result<usize> {
        if self.state != MapViewState::Active {
            debug!(
                "[map_view] dropping route #{} for a map view that is {:?}",
                generation, self.state
            );
            return Ok(0);
        }
        if thread::current().id() != self.overlays.owner() {
            bail!("route merge must run on the interactive thread");
        }
        if generation < self.resolved_generation {
            info!(
                "[map_view] dropping route #{}, #{} is newer",
                generation, self.resolved_generation
            );
            return Ok(0);
        }

        let roads = match result {
            Ok(roads) => roads,
            Err(e) => {
                warn!("[map_view] route #{} failed: {}", generation, e);
                self.resolved_generation = generation;
                self.last_route_error = Some(e);
                return Ok(0);
            }
        };

        if self.route_overlay_policy == RouteOverlayPolicy::Replace {
            let removed = self.overlays.remove_roads()?;
            if removed > 0 {
                debug!("[map_view] replaced {} road overlay(s)", removed);
            }
        }
        for road in &roads {
            self.overlays.add(Overlay::Road(RoadOverlay::build(road)))?;
        }
        let added = roads.len();
        info!("[map_view] route #{} merged: {} overlay(s)", generation, added);
        self.resolved_generation = generation;
        self.merged_generation = generation;
        self.roads = roads;
        self.last_route_error = None;
        Ok(added)
    }

    pub fn on_location_update(&mut self, fixes: Vec<LocationFix>) {
        if self.state != MapViewState::Active {
            return;
        }
        for fix in fixes {
            if self.location_filter.process(&fix) == FixResult::Ignore {
                debug!("[map_view] ignoring location fix {:?}", fix);
                continue;
            }
            let update = self.overlays.update_my_location(|my_location| {
                if !my_location.my_location_enabled {
                    return false;
                }
                my_location.last_fix = Some(fix.clone());
                my_location.follow_location_enabled
            });
            let follow = match update {
                Ok(follow) => follow.unwrap_or(false),
                Err(e) => {
                    error!("[map_view] location update off the interactive thread: {}", e);
                    return;
                }
            };
            if follow {
                if let Err(e) = self.view.set_center(fix.point) {
                    warn!("[map_view] cannot follow location: {}", e);
                }
            }
        }
    }

    pub fn enable_follow_location(&mut self, enable: bool) -> Result<()> {
        self.check_active()?;
        self.overlays.update_my_location(|my_location| {
            if enable {
                my_location.enable_follow_location();
            } else {
                my_location.disable_follow_location();
            }
        })?;
        Ok(())
    }

    /// Cancels in-flight work and stops location updates. Results arriving
    /// afterwards are ignored.
    pub fn dispose(&mut self) {
        if self.state == MapViewState::Disposed {
            return;
        }
        let aborted = self.tasks.cancel_all();
        if let Some(attached) = self.attached.as_mut() {
            attached.env.location_provider.stop();
        }
        if let Err(e) = self.overlays.update_my_location(|my_location| {
            my_location.disable_follow_location();
            my_location.disable_my_location();
        }) {
            warn!("[map_view] cannot disable location marker: {}", e);
        }
        self.attached = None;
        self.state = MapViewState::Disposed;
        info!("[map_view] disposed, {} task(s) cancelled", aborted);
    }
}

impl Drop for MapViewHost {
    fn drop(&mut self) {
        self.dispose();
    }
}
