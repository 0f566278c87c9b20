//! Graceful shutdown over real sockets.

use std::time::Duration;

use dispatchd::lifecycle::ServerState;
use dispatchd::observability::EventKind;
use hyper::Method;
use tokio::net::TcpStream;

mod common;
use common::{client, fixed, sleeping, start, test_config, test_server, url, wait_until};

#[tokio::test]
async fn in_flight_requests_finish_while_new_connections_are_refused() {
    let (mut server, events) = test_server(test_config(2, 5_000));
    server
        .register_route(Method::GET, "/slow", sleeping(Duration::from_millis(400), "finished"))
        .unwrap();
    let handle = start(server).await;
    let addr = handle.local_addr();

    let in_flight = tokio::spawn(client().get(url(&handle, "/slow")).send());
    assert!(wait_until(Duration::from_secs(1), || handle.stats().pool().in_use() == 1).await);

    let shutdown = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.shutdown(Duration::from_secs(5)).await })
    };
    assert!(wait_until(Duration::from_secs(1), || handle.state() == ServerState::Draining).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(
        TcpStream::connect(addr).await.is_err(),
        "listener still accepting while draining"
    );

    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "finished");

    let report = shutdown.await.unwrap();
    assert_eq!(report.drained, 1);
    assert!(report.is_clean());
    assert_eq!(handle.state(), ServerState::Stopped);
    assert_eq!(events.count(EventKind::ForcedTermination), 0);
}

#[tokio::test]
async fn stragglers_are_forced_after_drain_timeout() {
    let (mut server, events) = test_server(test_config(2, 60_000));
    server
        .register_route(Method::GET, "/hang", sleeping(Duration::from_secs(60), "never"))
        .unwrap();
    let handle = start(server).await;

    let in_flight = tokio::spawn(client().get(url(&handle, "/hang")).send());
    assert!(wait_until(Duration::from_secs(1), || handle.stats().pool().in_use() == 1).await);

    let started = std::time::Instant::now();
    let report = handle.shutdown(Duration::from_millis(100)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.forced, 1);
    assert_eq!(events.count(EventKind::ForcedTermination), 1);
    assert_eq!(handle.stats().active_connections(), 0);
    assert_eq!(handle.stats().pool().in_use(), 0);
    assert!(in_flight.await.unwrap().is_err(), "client should see the connection drop");
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let (mut server, _events) = test_server(test_config(1, 1_000));
    server.register_route(Method::GET, "/", fixed("ok")).unwrap();
    let handle = start(server).await;

    let res = client().get(url(&handle, "/")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let (first, second) = tokio::join!(
        handle.shutdown(Duration::from_secs(1)),
        handle.shutdown(Duration::from_secs(1)),
    );
    assert_eq!(first, second);

    let third = handle.shutdown(Duration::from_secs(1)).await;
    assert_eq!(third, first);
    assert_eq!(handle.state(), ServerState::Stopped);
    assert!(handle.stats().pool().is_closed());
}

#[tokio::test]
async fn stats_track_accepted_connections() {
    let (mut server, _events) = test_server(test_config(2, 1_000));
    server.register_route(Method::GET, "/", fixed("ok")).unwrap();
    let handle = start(server).await;
    assert_eq!(handle.state(), ServerState::Running);

    let client = client();
    for _ in 0..3 {
        let res = client.get(url(&handle, "/")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    assert_eq!(handle.stats().accepted_connections(), 3);
    let snapshot = handle.stats().snapshot();
    assert_eq!(snapshot.workers.acquired_total, 3);

    handle.shutdown(Duration::from_secs(1)).await;
    assert!(wait_until(Duration::from_secs(1), || handle.stats().active_connections() == 0).await);
}
