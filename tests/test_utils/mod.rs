use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use chrono::Utc;
use openstreemap_core::geo_point::{GeoPoint, Waypoint};
use openstreemap_core::map_view::MapCanvas;
use openstreemap_core::overlay::Overlay;
use openstreemap_core::road::Road;
use openstreemap_core::routing::{RoadManager, RouteFetchError};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn straight_road(waypoints: &[Waypoint]) -> Road {
    let route_high = match (waypoints.first(), waypoints.last()) {
        (Some(first), Some(last)) => vec![*first, *last],
        _ => Vec::new(),
    };
    let length_in_meters = match (waypoints.first(), waypoints.last()) {
        (Some(first), Some(last)) => first.distance_in_meters(last),
        _ => 0.0,
    };
    Road {
        route_high,
        length_in_meters,
        duration_in_seconds: length_in_meters / 10.0,
        legs: Vec::new(),
        nodes: Vec::new(),
        received_at: Utc::now(),
    }
}

type Respond = Box<dyn Fn(usize, &[Waypoint]) -> Result<Vec<Road>, RouteFetchError> + Send + Sync>;

/// In-process routing service. `respond` gets the call index (from 0) and the
/// waypoints.
pub struct StubRoadManager {
    respond: Respond,
    delays: Vec<Duration>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    fetch_threads: Mutex<Vec<ThreadId>>,
}

impl StubRoadManager {
    pub fn new(
        respond: impl Fn(usize, &[Waypoint]) -> Result<Vec<Road>, RouteFetchError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delays: Vec::new(),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            fetch_threads: Mutex::new(Vec::new()),
        }
    }

    pub fn straight() -> Self {
        Self::new(|_, waypoints| Ok(vec![straight_road(waypoints)]))
    }

    pub fn failing() -> Self {
        Self::new(|_, _| {
            Err(RouteFetchError::Service {
                code: "NoRoute".to_string(),
                message: "Impossible route between points".to_string(),
            })
        })
    }

    /// Delay of the n-th call; calls past the end of the list are not
    /// delayed.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn fetch_threads(&self) -> Vec<ThreadId> {
        self.fetch_threads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoadManager for StubRoadManager {
    async fn get_roads(&self, waypoints: &[Waypoint]) -> Result<Vec<Road>, RouteFetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_threads
            .lock()
            .unwrap()
            .push(thread::current().id());
        if let Some(delay) = self.delays.get(call) {
            tokio::time::sleep(*delay).await;
        }
        let result = (self.respond)(call, waypoints);
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default, Debug)]
pub struct CanvasLog {
    pub centers: Vec<GeoPoint>,
    pub zooms: Vec<f64>,
    /// thread and overlay count of every overlay update
    pub overlay_updates: Vec<(ThreadId, usize)>,
}

pub struct RecordingCanvas {
    log: Rc<RefCell<CanvasLog>>,
}

impl RecordingCanvas {
    pub fn new() -> (Self, Rc<RefCell<CanvasLog>>) {
        let log = Rc::new(RefCell::new(CanvasLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl MapCanvas for RecordingCanvas {
    fn set_center(&mut self, center: GeoPoint) {
        self.log.borrow_mut().centers.push(center);
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.log.borrow_mut().zooms.push(zoom);
    }

    fn set_overlays(&mut self, overlays: &[Overlay]) {
        self.log
            .borrow_mut()
            .overlay_updates
            .push((thread::current().id(), overlays.len()));
    }
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

pub fn encode_polyline(points: &[GeoPoint]) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);
    for p in points {
        let lat = (p.latitude * 1e5).round() as i64;
        let lng = (p.longitude * 1e5).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }
    out
}

/// OSRM JSON for a single route through `points`.
pub fn osrm_body(points: &[GeoPoint]) -> String {
    serde_json::json!({
        "code": "Ok",
        "routes": [{
            "geometry": encode_polyline(points),
            "distance": 1000.0,
            "duration": 100.0,
            "legs": [{"distance": 1000.0, "duration": 100.0, "steps": []}],
        }],
        "waypoints": [],
    })
    .to_string()
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub query: String,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub enum StubBehavior {
    /// Answers with a route through the requested coordinates.
    Echo,
    Fixed { status: u16, body: String },
}

struct StubState {
    behavior: StubBehavior,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn parse_coordinates(path: &str) -> Option<Vec<GeoPoint>> {
    let coordinates = path.rsplit('/').next()?;
    coordinates
        .split(';')
        .map(|pair| {
            let (lng, lat) = pair.split_once(',')?;
            Some(GeoPoint::new(lat.parse().ok()?, lng.parse().ok()?))
        })
        .collect()
}

async fn serve_route(req: HttpRequest, data: web::Data<StubState>) -> HttpResponse {
    let path = req.path().to_string();
    data.requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        query: req.query_string().to_string(),
        user_agent: req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    });
    match &data.behavior {
        StubBehavior::Echo => match parse_coordinates(&path) {
            Some(points) => HttpResponse::Ok()
                .content_type("application/json")
                .body(osrm_body(&points)),
            None => HttpResponse::BadRequest()
                .content_type("application/json")
                .body(r#"{"code":"InvalidQuery","message":"Query string malformed"}"#),
        },
        StubBehavior::Fixed { status, body } => {
            HttpResponse::build(StatusCode::from_u16(*status).unwrap())
                .content_type("application/json")
                .body(body.clone())
        }
    }
}

/// OSRM look-alike on a random local port, running on its own thread.
pub struct StubOsrmServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: actix_web::dev::ServerHandle,
}

impl StubOsrmServer {
    pub fn start(behavior: StubBehavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = web::Data::new(StubState {
            behavior,
            requests: requests.clone(),
        });
        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(state.clone())
                        .default_service(web::to(serve_route))
                })
                .workers(1)
                .bind(("127.0.0.1", 0))
                .expect("Failed to bind stub server");
                let port = server.addrs()[0].port();
                let server = server.run();
                tx.send((port, server.handle()))
                    .expect("Failed to send server handle");
                server.await.expect("Stub server failed");
            });
        });
        let (port, handle) = rx.recv().expect("Stub server did not start");
        Self {
            base_url: format!("http://127.0.0.1:{port}/route/v1/driving/"),
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubOsrmServer {
    fn drop(&mut self) {
        // the stop command is sent eagerly
        drop(self.handle.stop(false));
    }
}
