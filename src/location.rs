use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::geo_point::GeoPoint;

#[derive(Clone, Debug, PartialEq)]
pub struct LocationFix {
    pub point: GeoPoint,
    pub timestamp_ms: Option<i64>,
    pub accuracy: Option<f32>,
    pub altitude: Option<f32>,
    pub speed: Option<f32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FixResult {
    Accept,
    Ignore,
}

pub const DEFAULT_ACCURACY_THRESHOLD: f32 = 50.0;

/// Decides which fixes are good enough to move the location marker.
pub struct LocationFilter {
    accuracy_threshold: f32,
    last_fix: Option<LocationFix>,
}

impl LocationFilter {
    pub fn new(accuracy_threshold: f32) -> Self {
        LocationFilter {
            accuracy_threshold,
            last_fix: None,
        }
    }

    pub fn last_fix(&self) -> Option<&LocationFix> {
        self.last_fix.as_ref()
    }

    pub fn process(&mut self, fix: &LocationFix) -> FixResult {
        let result = if fix.point.validate().is_err() {
            FixResult::Ignore
        } else if fix
            .accuracy
            .map(|accuracy| accuracy > self.accuracy_threshold)
            .unwrap_or(false)
        {
            FixResult::Ignore
        } else {
            match (
                fix.timestamp_ms,
                self.last_fix.as_ref().and_then(|last| last.timestamp_ms),
            ) {
                // providers may deliver a stale fix after a fresher one
                (Some(now), Some(prev)) if now < prev => FixResult::Ignore,
                _ => FixResult::Accept,
            }
        };
        if result == FixResult::Accept {
            self.last_fix = Some(fix.clone());
        }
        result
    }
}

pub type LocationSink = Box<dyn Fn(Vec<LocationFix>) + Send + Sync>;

/// Platform source of device positions. `start` hands it a sink that may be
/// called from any thread.
pub trait LocationProvider {
    fn start(&mut self, sink: LocationSink) -> Result<()>;
    fn stop(&mut self);
}

/// A provider fed by platform code: whatever the platform's location callback
/// receives is pushed through a `LocationFeeder`.
#[derive(Default)]
pub struct PushLocationProvider {
    sink: Arc<Mutex<Option<LocationSink>>>,
}

#[derive(Clone)]
pub struct LocationFeeder {
    sink: Arc<Mutex<Option<LocationSink>>>,
}

impl PushLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeder(&self) -> LocationFeeder {
        LocationFeeder {
            sink: self.sink.clone(),
        }
    }
}

impl LocationProvider for PushLocationProvider {
    fn start(&mut self, sink: LocationSink) -> Result<()> {
        let mut guard = self.sink.lock().unwrap();
        if guard.is_some() {
            bail!("location provider already started");
        }
        *guard = Some(sink);
        debug!("[location] provider started");
        Ok(())
    }

    fn stop(&mut self) {
        let mut guard = self.sink.lock().unwrap();
        if guard.take().is_some() {
            debug!("[location] provider stopped");
        }
    }
}

impl LocationFeeder {
    /// Returns `false` when the provider is not started and the batch is
    /// dropped.
    pub fn on_location_update(&self, mut fixes: Vec<LocationFix>) -> bool {
        // Batches can arrive out of order on some devices.
        fixes.sort_by_key(|fix| fix.timestamp_ms);
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => {
                sink(fixes);
                true
            }
            None => false,
        }
    }
}
