use anyhow::Result;
use chrono::{DateTime, Utc};
use std::thread::{self, ThreadId};
use uuid::Uuid;

use crate::geo_point::GeoPoint;
use crate::location::LocationFix;
use crate::road::Road;

pub const DEFAULT_ROAD_COLOR: u32 = 0x800000FF;
pub const DEFAULT_ROAD_WIDTH: f32 = 5.0;

/// A polyline drawn for one road alternative.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadOverlay {
    pub id: Uuid,
    pub points: Vec<GeoPoint>,
    /// ARGB
    pub color: u32,
    pub width: f32,
    pub length_in_meters: f64,
    pub duration_in_seconds: f64,
    pub received_at: DateTime<Utc>,
}

impl RoadOverlay {
    pub fn build(road: &Road) -> Self {
        Self::build_with_style(road, DEFAULT_ROAD_COLOR, DEFAULT_ROAD_WIDTH)
    }

    pub fn build_with_style(road: &Road, color: u32, width: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            points: road.route_high.clone(),
            color,
            width,
            length_in_meters: road.length_in_meters,
            duration_in_seconds: road.duration_in_seconds,
            received_at: road.received_at,
        }
    }
}

/// The device position marker.
#[derive(Clone, Debug, PartialEq)]
pub struct MyLocationOverlay {
    pub id: Uuid,
    pub last_fix: Option<LocationFix>,
    pub my_location_enabled: bool,
    pub follow_location_enabled: bool,
}

impl MyLocationOverlay {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            last_fix: None,
            my_location_enabled: false,
            follow_location_enabled: false,
        }
    }

    pub fn enable_my_location(&mut self) {
        self.my_location_enabled = true;
    }

    pub fn disable_my_location(&mut self) {
        self.my_location_enabled = false;
    }

    pub fn enable_follow_location(&mut self) {
        self.follow_location_enabled = true;
    }

    pub fn disable_follow_location(&mut self) {
        self.follow_location_enabled = false;
    }

    pub fn my_location(&self) -> Option<GeoPoint> {
        self.last_fix.as_ref().map(|fix| fix.point)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    Road(RoadOverlay),
    MyLocation(MyLocationOverlay),
}

impl Overlay {
    pub fn id(&self) -> Uuid {
        match self {
            Overlay::Road(o) => o.id,
            Overlay::MyLocation(o) => o.id,
        }
    }

    pub fn as_road(&self) -> Option<&RoadOverlay> {
        match self {
            Overlay::Road(o) => Some(o),
            _ => None,
        }
    }
}

/// Insertion-ordered overlays of one map view. Bound to the thread that
/// created it; every mutation from another thread is refused.
pub struct OverlaySet {
    owner: ThreadId,
    overlays: Vec<Overlay>,
    version: u64,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
            overlays: Vec::new(),
            version: 0,
        }
    }

    fn check_thread(&self) -> Result<()> {
        let current = thread::current().id();
        if current != self.owner {
            bail!(
                "overlays of this map view belong to thread {:?}, mutated from {:?}",
                self.owner,
                current
            );
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn add(&mut self, overlay: Overlay) -> Result<()> {
        self.check_thread()?;
        self.overlays.push(overlay);
        self.touch();
        Ok(())
    }

    /// Returns the number of removed overlays.
    pub fn remove_roads(&mut self) -> Result<usize> {
        self.check_thread()?;
        let before = self.overlays.len();
        self.overlays.retain(|o| !matches!(o, Overlay::Road(_)));
        let removed = before - self.overlays.len();
        if removed > 0 {
            self.touch();
        }
        Ok(removed)
    }

    /// Runs `f` on the location marker, if there is one. The version only
    /// moves when `f` actually changed the marker.
    pub fn update_my_location<R>(
        &mut self,
        f: impl FnOnce(&mut MyLocationOverlay) -> R,
    ) -> Result<Option<R>> {
        self.check_thread()?;
        let my_location = match self.overlays.iter_mut().find_map(|o| match o {
            Overlay::MyLocation(o) => Some(o),
            _ => None,
        }) {
            Some(my_location) => my_location,
            None => return Ok(None),
        };
        let before = my_location.clone();
        let result = f(my_location);
        let changed = *my_location != before;
        if changed {
            self.touch();
        }
        Ok(Some(result))
    }

    pub fn my_location(&self) -> Option<&MyLocationOverlay> {
        self.overlays.iter().find_map(|o| match o {
            Overlay::MyLocation(o) => Some(o),
            _ => None,
        })
    }

    pub fn roads(&self) -> impl Iterator<Item = &RoadOverlay> {
        self.overlays.iter().filter_map(Overlay::as_road)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter()
    }

    pub fn as_slice(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }
}
