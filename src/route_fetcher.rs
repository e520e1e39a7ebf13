use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::geo_point::Waypoint;
use crate::looper::MainHandle;
use crate::road::Road;
use crate::routing::{RoadManager, RouteFetchError};

pub type RouteResult = Result<Vec<Road>, RouteFetchError>;

/// Runs route requests on the background pool and hands every result, success
/// or failure, back to the interactive thread.
#[derive(Clone)]
pub struct RouteFetcher {
    road_manager: Arc<dyn RoadManager>,
    runtime: Handle,
}

impl RouteFetcher {
    pub fn new(road_manager: Arc<dyn RoadManager>, runtime: Handle) -> Self {
        Self {
            road_manager,
            runtime,
        }
    }

    /// `on_result` runs on the thread that owns `main`, never on the pool.
    pub fn fetch<S, F>(&self, waypoints: Vec<Waypoint>, main: MainHandle<S>, on_result: F) -> AbortHandle
    where
        S: 'static,
        F: FnOnce(&mut S, RouteResult) + Send + 'static,
    {
        let road_manager = self.road_manager.clone();
        let task = self.runtime.spawn(async move {
            let result = road_manager.get_roads(&waypoints).await;
            match &result {
                Ok(roads) => debug!("[route_fetcher] fetched {} road(s)", roads.len()),
                Err(e) => warn!("[route_fetcher] fetch failed: {}", e),
            }
            if main.post(move |state| on_result(state, result)).is_err() {
                debug!("[route_fetcher] interactive thread is gone, dropping result");
            }
        });
        task.abort_handle()
    }
}
