//! Opens the map screen against the public OSRM service and prints what the
//! renderer would draw.
//!
//! cargo run --example navigation [support_dir]
//!
//! With a support dir, preferences are read from it and logs go to
//! `{support_dir}/logs/main.log`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use openstreemap_core::config::MapConfig;
use openstreemap_core::geo_point::GeoPoint;
use openstreemap_core::location::{LocationFix, PushLocationProvider};
use openstreemap_core::logs;
use openstreemap_core::map_view::MapCanvas;
use openstreemap_core::overlay::Overlay;
use openstreemap_core::routing::OsrmRoadManager;
use openstreemap_core::screen::NavigationScreen;

struct PrintingCanvas;

impl MapCanvas for PrintingCanvas {
    fn set_center(&mut self, center: GeoPoint) {
        println!("center: {:.5}, {:.5}", center.latitude, center.longitude);
    }

    fn set_zoom(&mut self, zoom: f64) {
        println!("zoom: {zoom}");
    }

    fn set_overlays(&mut self, overlays: &[Overlay]) {
        for overlay in overlays {
            match overlay {
                Overlay::Road(road) => println!(
                    "road: {} points, {:.1} km, {:.0} min",
                    road.points.len(),
                    road.length_in_meters / 1000.0,
                    road.duration_in_seconds / 60.0
                ),
                Overlay::MyLocation(marker) => match marker.my_location() {
                    Some(p) => println!("me: {:.5}, {:.5}", p.latitude, p.longitude),
                    None => println!("me: unknown"),
                },
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let mut screen = match std::env::args().nth(1) {
        Some(support_dir) => {
            logs::init(&support_dir)?;
            logs::set_listener(Box::new(|line| eprintln!("{line}")));
            NavigationScreen::from_preferences(&support_dir)?
        }
        None => {
            env_logger::init();
            let config = MapConfig::default();
            let road_manager = OsrmRoadManager::from_config(&config)?;
            NavigationScreen::new(config, Arc::new(road_manager))?
        }
    };

    let provider = PushLocationProvider::new();
    let feeder = provider.feeder();
    let generation = screen.start(Box::new(PrintingCanvas), Box::new(provider))?;

    // a pretend GPS walking along the route start
    thread::spawn(move || {
        for i in 0..5 {
            thread::sleep(Duration::from_millis(500));
            let fix = LocationFix {
                point: GeoPoint::new(36.84924, 10.19023 + i as f64 * 0.0005),
                timestamp_ms: Some(i * 1000),
                accuracy: Some(8.0),
                altitude: None,
                speed: Some(1.4),
            };
            if !feeder.on_location_update(vec![fix]) {
                break;
            }
        }
    });

    let merged = screen.pump_until(Duration::from_secs(35), |host| {
        host.merged_generation() >= generation || host.last_route_error().is_some()
    })?;
    if let Some(e) = screen.host().last_route_error() {
        eprintln!("route failed: {e}");
    } else if !merged {
        eprintln!("no route yet");
    }

    screen.pump_until(Duration::from_secs(3), |_| false)?;
    screen.dispose();
    Ok(())
}
