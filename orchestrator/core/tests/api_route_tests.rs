// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use appfleet_core::infrastructure::event_bus::EventBus;
use appfleet_core::infrastructure::repositories::{
    InMemoryApplicationRepository, InMemoryVolumeRepository,
};
use appfleet_core::infrastructure::runtime::MockContainerRuntime;
use appfleet_core::presentation::api::{router, AppState, USER_HEADER};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::new(
        Arc::new(InMemoryApplicationRepository::new()),
        Arc::new(InMemoryVolumeRepository::new()),
        Arc::new(MockContainerRuntime::new()),
        Arc::new(EventBus::with_default_capacity()),
        "apps.example.net",
    );
    router(state)
}

async fn send(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_shop(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/applications",
        Some("jdoe"),
        Some(json!({ "name": "shop", "server_type": "tomcat" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_needs_no_user() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/applications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains(USER_HEADER));
}

#[tokio::test]
async fn test_create_then_lifecycle_links() {
    let app = app();
    let id = create_shop(&app).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/applications/{}", id), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "START");
    assert!(body["_links"]["stop"].is_object());
    assert!(body["_links"]["start"].is_null());

    let (status, _) = send(&app, Method::POST, &format!("/api/applications/{}/stop", id), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::POST, &format!("/api/applications/{}/stop", id), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    let (_, body) = send(&app, Method::GET, &format!("/api/applications/{}", id), Some("jdoe"), None).await;
    assert_eq!(body["status"], "STOP");
    assert_eq!(body["_links"]["start"]["method"], "POST");
}

#[tokio::test]
async fn test_other_users_see_nothing() {
    let app = app();
    let id = create_shop(&app).await;

    let (status, _) = send(&app, Method::GET, &format!("/api/applications/{}", id), Some("mallory"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, Method::GET, "/api/applications", Some("mallory"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_port_errors_map_to_status_codes() {
    let app = app();
    let id = create_shop(&app).await;
    let ports = format!("/api/applications/{}/ports", id);

    let (status, body) = send(&app, Method::POST, &ports, Some("jdoe"), Some(json!({ "number": 8080, "nature": "web", "quick_access": true }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["alias"], "shop-jdoe-forward-8080.apps.example.net");

    let (status, _) = send(&app, Method::POST, &ports, Some("jdoe"), Some(json!({ "number": 8080, "nature": "debug" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, &ports, Some("jdoe"), Some(json!({ "number": 9000, "nature": "telnet" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, &format!("{}/9090", ports), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("{}/8080", ports), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_alias_round_trip() {
    let app = app();
    let id = create_shop(&app).await;
    let aliases = format!("/api/applications/{}/aliases", id);

    let (status, body) = send(&app, Method::POST, &aliases, Some("jdoe"), Some(json!({ "alias": "WWW.Shop.io" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["alias"], "www.shop.io");

    let (_, body) = send(&app, Method::GET, &aliases, Some("jdoe"), None).await;
    assert_eq!(body, json!([{ "alias": "www.shop.io" }]));

    let (status, _) = send(&app, Method::DELETE, &format!("{}/www.shop.io", aliases), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("{}/www.shop.io", aliases), Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mounted_volume_cannot_be_removed() {
    let app = app();
    let id = create_shop(&app).await;

    let (status, _) = send(&app, Method::POST, "/api/volumes", Some("jdoe"), Some(json!({ "name": "shop-data" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/volumes/shop-data/mounts",
        Some("jdoe"),
        Some(json!({ "application_id": id, "path": "/data" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, _) = send(&app, Method::DELETE, "/api/volumes/shop-data", Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/volumes/shop-data/mounts?application_id={}&container=jdoe-shop-tomcat", id),
        Some("jdoe"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::DELETE, "/api/volumes/shop-data", Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_malformed_ids_are_bad_requests() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/applications/not-a-uuid", Some("jdoe"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not-a-uuid"));
}
