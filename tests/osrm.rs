pub mod test_utils;
#[macro_use]
extern crate assert_float_eq;
use openstreemap_core::config::MapConfig;
use openstreemap_core::routing::{OsrmRoadManager, RoadManager, RouteFetchError};
use openstreemap_core::screen::{NavigationScreen, DEFAULT_ROUTE};
use openstreemap_core::location::PushLocationProvider;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{init_logger, RecordingCanvas, StubBehavior, StubOsrmServer, TIMEOUT};

const USER_AGENT: &str = "openstreemap-test/1.0";

fn manager(server: &StubOsrmServer, max_retries: u32) -> OsrmRoadManager {
    OsrmRoadManager::new(
        &server.base_url,
        USER_AGENT,
        Duration::from_secs(5),
        max_retries,
    )
    .unwrap()
    .with_retry_base_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn route_starts_and_ends_at_waypoints() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Echo);
    let roads = manager(&server, 0).get_roads(&DEFAULT_ROUTE).await.unwrap();

    assert_eq!(roads.len(), 1);
    let road = &roads[0];
    assert!(road.start().unwrap().approx_eq(&DEFAULT_ROUTE[0], 1e-6));
    assert!(road.end().unwrap().approx_eq(&DEFAULT_ROUTE[1], 1e-6));
    assert_float_absolute_eq!(road.length_in_meters, 1000.0, 1e-9);
    assert_float_absolute_eq!(road.duration_in_seconds, 100.0, 1e-9);
    assert_eq!(road.legs.len(), 1);
}

#[tokio::test]
async fn request_carries_coordinates_and_user_agent() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Echo);
    manager(&server, 0).get_roads(&DEFAULT_ROUTE).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .path
        .ends_with("/route/v1/driving/10.19023,36.84924;10.2662,36.8586"));
    assert!(requests[0].query.contains("overview=full"));
    assert_eq!(requests[0].user_agent.as_deref(), Some(USER_AGENT));
}

#[tokio::test]
async fn server_errors_are_retried() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Fixed {
        status: 500,
        body: "internal error".to_string(),
    });
    let result = manager(&server, 1).get_roads(&DEFAULT_ROUTE).await;

    match result {
        Err(RouteFetchError::HttpStatus { status, .. }) => assert_eq!(status, 500),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn invalid_query_is_not_retried() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Fixed {
        status: 400,
        body: r#"{"code":"InvalidQuery","message":"Query string malformed close to position 28"}"#
            .to_string(),
    });
    let result = manager(&server, 2).get_roads(&DEFAULT_ROUTE).await;

    match result {
        Err(RouteFetchError::Service { code, message }) => {
            assert_eq!(code, "InvalidQuery");
            assert!(message.starts_with("Query string malformed"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn no_route_is_a_service_error() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Fixed {
        status: 200,
        body: r#"{"code":"NoRoute","message":"Impossible route between points","routes":[]}"#
            .to_string(),
    });
    let result = manager(&server, 0).get_roads(&DEFAULT_ROUTE).await;
    assert!(matches!(result, Err(RouteFetchError::Service { code, .. }) if code == "NoRoute"));
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Fixed {
        status: 200,
        body: "<html>maintenance</html>".to_string(),
    });
    let result = manager(&server, 0).get_roads(&DEFAULT_ROUTE).await;
    assert!(matches!(result, Err(RouteFetchError::MalformedResponse(_))));
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    init_logger();
    let manager = OsrmRoadManager::new(
        "http://127.0.0.1:9/route/v1/driving/",
        USER_AGENT,
        Duration::from_secs(2),
        0,
    )
    .unwrap();
    let result = manager.get_roads(&DEFAULT_ROUTE).await;
    match result {
        Err(e @ RouteFetchError::Network(_)) => assert!(e.is_transient()),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn too_few_waypoints_make_no_request() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Echo);
    let result = manager(&server, 0).get_roads(&DEFAULT_ROUTE[..1]).await;
    assert!(matches!(result, Err(RouteFetchError::InvalidWaypoints(_))));
    assert!(server.requests().is_empty());
}

#[test]
fn screen_draws_route_from_service() {
    init_logger();
    let server = StubOsrmServer::start(StubBehavior::Echo);
    let config = MapConfig {
        routing_service_url: server.base_url.clone(),
        user_agent: USER_AGENT.to_string(),
        ..MapConfig::default()
    };
    let road_manager = OsrmRoadManager::from_config(&config).unwrap();
    let mut screen = NavigationScreen::new(config, Arc::new(road_manager)).unwrap();
    let (canvas, log) = RecordingCanvas::new();
    screen
        .start(Box::new(canvas), Box::new(PushLocationProvider::new()))
        .unwrap();

    assert!(screen
        .pump_until(TIMEOUT, |host| host.merged_generation() == 1)
        .unwrap());
    let roads: Vec<_> = screen.host().overlays().roads().collect();
    assert_eq!(roads.len(), 1);
    assert!(roads[0].points[0].approx_eq(&DEFAULT_ROUTE[0], 1e-6));
    assert!(roads[0].points[1].approx_eq(&DEFAULT_ROUTE[1], 1e-6));
    assert_eq!(log.borrow().overlay_updates.last().map(|(_, n)| *n), Some(2));
    assert_eq!(server.requests().len(), 1);
}
