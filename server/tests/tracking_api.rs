//! Tracking endpoints over the real router and an in-memory bus.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestApp;
use serde_json::json;
use storefront_insights_core::event_bus::{AUTH_TOPIC, BEHAVIOR_TOPIC};
use storefront_insights_web::CORRELATION_ID_HEADER;
use tower::ServiceExt;

#[tokio::test]
async fn test_generic_event_is_queued_on_behavior_topic() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/tracking/events",
            json!({
                "eventType": "product_viewed",
                "sessionId": "s-1",
                "customerId": 7,
                "eventData": { "productId": "P1", "price": 1200 }
            }),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "status": "queued" }));

    let messages = app.published_json(BEHAVIOR_TOPIC);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["eventType"], "product_viewed");
    assert_eq!(messages[0]["sessionId"], "s-1");
    assert_eq!(messages[0]["eventData"]["productId"], "P1");
    assert!(app.published_json(AUTH_TOPIC).is_empty());
}

#[tokio::test]
async fn test_tracking_keeps_caller_correlation_id() {
    let app = TestApp::new();
    let correlation_id = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";
    let request = Request::builder()
        .method("POST")
        .uri("/api/tracking/product-click")
        .header("content-type", "application/json")
        .header(CORRELATION_ID_HEADER, correlation_id)
        .body(Body::from(json!({ "sessionId": "s-1", "productId": 42 }).to_string()))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        response.headers().get(CORRELATION_ID_HEADER).unwrap(),
        correlation_id
    );
    assert_eq!(app.published_json(BEHAVIOR_TOPIC).len(), 1);
}

#[tokio::test]
async fn test_client_ip_and_user_agent_are_stamped() {
    let app = TestApp::new();

    let (status, _) = app
        .post_with(
            "/api/tracking/events",
            json!({ "eventType": "page_view", "sessionId": "s-1", "pageUrl": "/home" }),
            &[
                ("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
                ("user-agent", "Mozilla/5.0 (iPhone)"),
            ],
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let message = &app.published_json(BEHAVIOR_TOPIC)[0];
    assert_eq!(message["ipAddress"], "203.0.113.9");
    assert_eq!(message["deviceInfo"]["userAgent"], "Mozilla/5.0 (iPhone)");
}

#[tokio::test]
async fn test_explicit_device_info_is_kept() {
    let app = TestApp::new();

    app.post_with(
        "/api/tracking/events",
        json!({
            "eventType": "page_view",
            "sessionId": "s-1",
            "deviceInfo": { "deviceType": "tablet" }
        }),
        &[("user-agent", "curl/8.0")],
    )
    .await;

    let message = &app.published_json(BEHAVIOR_TOPIC)[0];
    assert_eq!(message["deviceInfo"], json!({ "deviceType": "tablet" }));
}

#[tokio::test]
async fn test_unknown_event_type_is_still_queued() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/tracking/events",
            json!({ "eventType": "wishlist_shared", "sessionId": "s-1" }),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(app.published_json(BEHAVIOR_TOPIC)[0]["eventType"], "wishlist_shared");
}

#[tokio::test]
async fn test_missing_session_is_rejected_and_not_queued() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/tracking/events", json!({ "eventType": "page_view", "sessionId": "  " }))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("sessionId"));
    assert_eq!(app.bus.published_count(), 0);
}

#[tokio::test]
async fn test_search_without_query_is_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/tracking/events",
            json!({ "eventType": "search", "sessionId": "s-1", "eventData": {} }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.bus.published_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/tracking/events")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_product_click_builds_product_event() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/tracking/product-click",
            json!({ "sessionId": "s-1", "productId": 42, "position": 2, "source": "search" }),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let message = &app.published_json(BEHAVIOR_TOPIC)[0];
    assert_eq!(message["eventType"], "product_click");
    assert_eq!(message["entityId"], "42");
    assert_eq!(message["entityType"], "product");
    assert_eq!(message["eventData"]["position"], 2);
}

#[tokio::test]
async fn test_discount_usage_requires_code() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/tracking/discount-usage",
            json!({ "sessionId": "s-1", "discountAmount": 50000 }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("discountCode"));
    assert_eq!(app.bus.published_count(), 0);
}

#[tokio::test]
async fn test_discount_usage_is_queued() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/tracking/discount-usage",
            json!({
                "sessionId": "s-1",
                "discountCode": "SALE10",
                "discountAmount": 50000,
                "orderTotal": 500000,
                "orderId": "O-1"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let message = &app.published_json(BEHAVIOR_TOPIC)[0];
    assert_eq!(message["eventType"], "discount_usage");
    assert_eq!(message["eventData"]["discountCode"], "SALE10");
}

#[tokio::test]
async fn test_auth_events_go_to_auth_topic() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/tracking/auth",
            json!({ "action": "login", "customerId": 7, "sessionId": "s-1", "method": "password" }),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(app.published_json(BEHAVIOR_TOPIC).is_empty());
    let message = &app.published_json(AUTH_TOPIC)[0];
    assert_eq!(message["eventType"], "user_authenticated");
    assert_eq!(message["customerId"], 7);
}

#[tokio::test]
async fn test_auth_with_unknown_action_is_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/tracking/auth",
            json!({ "action": "impersonate", "customerId": 7, "sessionId": "s-1" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.bus.published_count(), 0);
}

#[tokio::test]
async fn test_queue_outage_is_service_unavailable() {
    let app = TestApp::new();
    app.bus.fail_publishes(true);

    let (status, body) = app
        .post("/api/tracking/events", json!({ "eventType": "page_view", "sessionId": "s-1" }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}
