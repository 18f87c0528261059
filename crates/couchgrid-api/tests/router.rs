//! Router tests over an in-memory platform and database nodes.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use couchgrid_api::build_router;
use couchgrid_core::config::SpawnerConfig;
use couchgrid_health::{RecordingClock, RetryPolicy};
use couchgrid_lifecycle::{ClusterController, ControllerSettings};
use couchgrid_platform::{InMemoryPlatform, ResourceKind};
use couchgrid_replication::{MemoryCouch, TopologyEngine};
use couchgrid_spawner::build_spawner;
use couchgrid_state::StateStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

fn test_router() -> (Router, InMemoryPlatform, MemoryCouch) {
    let platform = InMemoryPlatform::new();
    let couch = MemoryCouch::new();
    let clock = RecordingClock::new();
    let spawner = build_spawner(&SpawnerConfig::default(), Arc::new(platform.clone()));
    let topology = TopologyEngine::new(
        Arc::new(couch.clone()),
        Arc::new(clock.clone()),
        RetryPolicy::new(3, Duration::from_millis(10)),
    );
    let controller = ClusterController::new(
        Arc::new(platform.clone()),
        spawner,
        topology,
        StateStore::open_in_memory().unwrap(),
        Arc::new(clock),
        ControllerSettings::default(),
    );
    (build_router(Arc::new(controller)), platform, couch)
}

fn form_post(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(router: &Router, path: &str, body: &str) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(form_post(path, body)).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn help_text_on_root() {
    let (router, _, _) = test_router();
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("/v0/database/create"));
}

#[tokio::test]
async fn missing_username_is_unauthorized() {
    let (router, platform, _) = test_router();

    let (status, body) = call(&router, "/v0/database/create", "replicas=2").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "unauthorized");
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn create_detail_list_scale_drop() {
    let (router, platform, couch) = test_router();

    let (status, body) = call(
        &router,
        "/v0/database/create",
        "username=alice&token=t&cluster_tag=abcd&replicas=3&databases=orders,_users",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["tag"], "abcd");
    assert_eq!(body["data"]["desired_replicas"], 3);
    assert!(body["data"]["admin_password"].as_str().is_some_and(|p| p.len() == 16));
    assert_eq!(couch.all_replications().len(), 3);

    let (status, body) = call(&router, "/v0/database/detail", "username=alice&cluster_tag=abcd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nodes"].as_array().map(Vec::len), Some(3));
    assert!(body["data"].get("admin_password").is_none());

    let (_, body) = call(&router, "/v0/database/list", "username=alice").await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = call(&router, "/v0/database/scale", "username=alice&cluster_tag=abcd&replicas=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["desired_replicas"], 2);
    assert!(body["data"].get("admin_password").is_none());

    let (status, body) = call(&router, "/v0/database/drop", "username=alice&cluster_tag=abcd").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("data").is_none());
    assert!(platform.names("default", ResourceKind::Pod).is_empty());

    let (_, body) = call(&router, "/v0/database/list", "username=alice").await;
    assert_eq!(body["data"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn unknown_cluster_is_404_with_error_kind() {
    let (router, _, _) = test_router();

    let (status, body) = call(&router, "/v0/database/scale", "username=alice&cluster_tag=nope&replicas=2").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["kind"], "not_found");
    assert!(body["error"]["detail"].as_str().is_some_and(|d| d.contains("nope")));
}

#[tokio::test]
async fn duplicate_create_is_409() {
    let (router, _, _) = test_router();
    let form = "username=alice&cluster_tag=abcd&replicas=1";
    call(&router, "/v0/database/create", form).await;

    let (status, body) = call(&router, "/v0/database/create", form).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");
}

#[tokio::test]
async fn replicate_reports_summary_without_credentials() {
    let (router, _, _) = test_router();
    call(&router, "/v0/database/create", "username=alice&cluster_tag=abcd&replicas=2").await;

    let (status, body) = call(
        &router,
        "/v0/database/replicate",
        "username=alice&cluster_tag=abcd&databases=orders,items",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nodes"], 2);
    assert_eq!(body["data"]["links"], 4);
    assert_eq!(body["data"]["databases"], serde_json::json!(["orders", "items"]));
    assert!(!body.to_string().contains('@'));
}

#[tokio::test]
async fn replicate_without_databases_is_400() {
    let (router, _, _) = test_router();
    call(&router, "/v0/database/create", "username=alice&cluster_tag=abcd&replicas=2").await;

    let (status, body) = call(&router, "/v0/database/replicate", "username=alice&cluster_tag=abcd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_request");
}

#[tokio::test]
async fn body_without_form_content_type_gets_the_envelope() {
    let (router, platform, _) = test_router();
    let req = Request::builder()
        .method("POST")
        .uri("/v0/database/create")
        .body(Body::from("username=alice&replicas=2"))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["kind"], "invalid_request");
    assert!(platform.calls().is_empty());
}
