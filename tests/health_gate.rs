//! End-to-end proxying through a service listener: health gate, prefix
//! routing and header forwarding.

mod common;

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mesh_proxy::config::ServiceConfig;
use mesh_proxy::http::HttpForwarderFactory;
use mesh_proxy::manager::Manager;

use common::{
    checked_service, client, recording_backend, service, start_programmable_backend, wait_until,
    StubProvider,
};

fn manager() -> Manager {
    Manager::new(StubProvider::new(), Arc::new(HttpForwarderFactory))
}

#[tokio::test]
async fn unhealthy_backend_is_gated_then_recovers() {
    let status = Arc::new(AtomicU16::new(200));
    let traffic = Arc::new(AtomicUsize::new(0));
    let backend = {
        let status = status.clone();
        let traffic = traffic.clone();
        start_programmable_backend(move |request| {
            if request.target == "/health" {
                (status.load(Ordering::SeqCst), String::new())
            } else {
                traffic.fetch_add(1, Ordering::SeqCst);
                (200, "served".to_string())
            }
        })
        .await
    };

    let manager = manager();
    let snapshot = manager
        .add_service(checked_service("api", backend, 10, 2))
        .await
        .unwrap();
    let url = format!("http://{}/work", snapshot.listeners.plaintext.unwrap());
    let client = client();

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "served");

    let manager_ref = &manager;
    status.store(500, Ordering::SeqCst);
    assert!(
        wait_until(Duration::from_secs(2), || async move {
            !manager_ref.health().await["api"]
        })
        .await,
        "service should be marked unhealthy"
    );

    let before = traffic.load(Ordering::SeqCst);
    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 503);
    assert_eq!(traffic.load(Ordering::SeqCst), before, "gated request must not reach the backend");

    status.store(200, Ordering::SeqCst);
    assert!(
        wait_until(Duration::from_secs(2), || async move {
            manager_ref.health().await["api"]
        })
        .await,
        "service should recover after one success"
    );
    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);

    manager.shutdown().await;
}

#[tokio::test]
async fn redirect_status_counts_as_healthy() {
    let backend = start_programmable_backend(|_| (301, String::new())).await;
    let manager = manager();
    manager
        .add_service(checked_service("api", backend, 10, 1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.health().await["api"]);
    manager.shutdown().await;
}

#[tokio::test]
async fn prefix_is_stripped_and_query_kept() {
    let (backend, seen) = recording_backend().await;
    let manager = manager();
    let snapshot = manager
        .add_service(ServiceConfig {
            paths: vec!["/api".into()],
            strip_prefix: true,
            ..service("api", backend)
        })
        .await
        .unwrap();
    let base = format!("http://{}", snapshot.listeners.plaintext.unwrap());
    let client = client();

    let body = client
        .get(format!("{}/api/users?page=2", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "/users?page=2");

    let response = client.get(format!("{}/other", base)).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(seen.lock().unwrap().len(), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn forwarding_headers_and_body_reach_backend() {
    let (backend, seen) = recording_backend().await;
    let manager = manager();
    let snapshot = manager.add_service(service("api", backend)).await.unwrap();
    let addr = snapshot.listeners.plaintext.unwrap();

    let response = client()
        .post(format!("http://{}/submit", addr))
        .header("x-request-id", "req-1")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "req-1");

    let seen = seen.lock().unwrap();
    let request = &seen[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/submit");
    assert_eq!(request.body, b"payload");
    assert_eq!(request.header("x-forwarded-for"), Some("127.0.0.1"));
    assert_eq!(request.header("x-forwarded-proto"), Some("http"));
    assert_eq!(request.header("x-forwarded-host"), Some(addr.to_string().as_str()));
    assert_eq!(request.header("x-request-id"), Some("req-1"));
    drop(seen);

    manager.shutdown().await;
}

#[tokio::test]
async fn unreachable_backend_is_bad_gateway() {
    // Bind and drop to get a port nothing listens on.
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let manager = manager();
    let snapshot = manager.add_service(service("api", dead)).await.unwrap();

    let response = client()
        .get(format!("http://{}/", snapshot.listeners.plaintext.unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    manager.shutdown().await;
}
