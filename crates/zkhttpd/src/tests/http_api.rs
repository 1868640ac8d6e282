//! HTTP surface tests driving the router without a socket.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::coordination::{Coordination, CreateMode};
use crate::dispatch::{Dispatcher, MAX_REQUEST_BYTES, default_acl};
use crate::transport::{HEALTH_PATH, router};

use super::support::MemoryCoordination;

struct Reply {
    status: StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

#[fixture]
fn session() -> MemoryCoordination {
    let session = MemoryCoordination::new();
    session
        .create("/services", b"", &default_acl(), CreateMode::Persistent)
        .expect("create prefix node");
    session
}

fn app(session: &MemoryCoordination, endpoint: &str) -> Router {
    let coordination: Arc<dyn Coordination> = Arc::new(session.clone());
    router(Arc::new(Dispatcher::new(coordination, "/services")), endpoint)
}

async fn send(app: Router, method: Method, uri: &str, body: impl Into<Body>) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .expect("build request");
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body")
        .to_vec();
    Reply {
        status,
        content_type,
        body,
    }
}

async fn post_json(app: Router, body: &Value) -> Reply {
    send(app, Method::POST, "/zk", body.to_string()).await
}

#[rstest]
#[tokio::test]
async fn create_answers_with_the_resolved_path(session: MemoryCoordination) {
    let reply = post_json(
        app(&session, "/zk"),
        &json!({"cmd": "create", "path": "a", "data": "hello"}),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type.as_deref(), Some("application/json"));
    assert_eq!(reply.json(), json!({"path": "/services/a"}));
    assert_eq!(session.data("/services/a"), Some(b"hello".to_vec()));
}

#[rstest]
#[tokio::test]
async fn delete_answers_without_a_body(session: MemoryCoordination) {
    session
        .create("/services/a", b"", &default_acl(), CreateMode::Persistent)
        .expect("seed node");

    let reply = post_json(
        app(&session, "/zk"),
        &json!({"cmd": "delete", "path": "a", "version": -1}),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_empty());
    assert!(reply.content_type.is_none());
}

#[rstest]
#[tokio::test]
async fn exists_reports_all_metadata_keys(session: MemoryCoordination) {
    session
        .create("/services/a", b"abc", &default_acl(), CreateMode::Persistent)
        .expect("seed node");

    let reply = post_json(app(&session, "/zk"), &json!({"cmd": "exists", "path": "a"})).await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["exist"], json!(true));
    assert_eq!(body["data_length"], json!(3));
    for key in [
        "czxid",
        "mzxid",
        "ctime",
        "mtime",
        "version",
        "cversion",
        "aversion",
        "ephemeral_owner",
        "num_children",
        "pzxid",
    ] {
        assert!(body.get(key).is_some(), "missing {key} in {body}");
    }
}

#[rstest]
#[tokio::test]
async fn errors_carry_a_message(session: MemoryCoordination) {
    let reply = post_json(app(&session, "/zk"), &json!({"cmd": "multi"})).await;

    assert_eq!(reply.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(reply.content_type.as_deref(), Some("application/json"));
    assert_eq!(reply.json(), json!({"message": "unimplemented command: multi"}));
}

#[rstest]
#[tokio::test]
async fn oversized_bodies_are_client_errors(session: MemoryCoordination) {
    let body = vec![b' '; MAX_REQUEST_BYTES + 1];
    let before = session.calls();

    let reply = send(app(&session, "/zk"), Method::POST, "/zk", body).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["message"].is_string());
    assert_eq!(session.calls(), before);
}

#[rstest]
#[tokio::test]
async fn health_probe_reports_ok(session: MemoryCoordination) {
    let reply = send(app(&session, "/zk"), Method::GET, HEALTH_PATH, Body::empty()).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"status": "ok"}));
}

#[rstest]
#[tokio::test]
async fn command_endpoint_only_accepts_post(session: MemoryCoordination) {
    let reply = send(app(&session, "/zk"), Method::GET, "/zk", Body::empty()).await;

    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[rstest]
#[tokio::test]
async fn custom_endpoint_replaces_the_default(session: MemoryCoordination) {
    let app = app(&session, "/api/v1/zk");

    let reply = send(
        app.clone(),
        Method::POST,
        "/api/v1/zk",
        json!({"cmd": "exists", "path": "a"}).to_string(),
    )
    .await;
    let missing = send(app, Method::POST, "/zk", Body::empty()).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn endpoint_may_shadow_the_health_probe(session: MemoryCoordination) {
    let reply = send(
        app(&session, HEALTH_PATH),
        Method::POST,
        HEALTH_PATH,
        json!({"cmd": "exists", "path": "a"}).to_string(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"exist": false}));
}
