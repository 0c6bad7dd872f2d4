use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::{
    CATALOG_ITEMS, TEST_ADMIN_TOKEN, setup_broken_app, setup_slow_app, setup_test_app,
    setup_test_app_no_auth,
};

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn reset_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/v1/maintenance/reset");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_api_source_returns_fresh_then_cached() {
    let app = setup_test_app().await;
    let uri = "/v1/sources/vestiaire/search?q=chanel";

    let (status, json) = get(&app.router, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["origin"], "fresh");
    assert_eq!(json["count"], 3);
    assert_eq!(json["error"], serde_json::Value::Null);
    assert_eq!(json["data"][0]["Title"], "Chanel Classic Flap Bag");
    assert_eq!(json["data"][0]["Brand"], "Chanel");
    assert_eq!(json["data"][0]["Price"], "£4,250");
    // 1003 snaps to 1000
    assert_eq!(json["pagination"]["total_items"], 1000);
    assert_eq!(json["pagination"]["total_pages"], 20);
    assert_eq!(json["pagination"]["has_more"], true);

    let (_, cached) = get(&app.router, uri).await;
    assert_eq!(cached["origin"], "cached");
    assert_eq!(cached["data"], json["data"]);
    assert_eq!(app.upstream.calls(), 1);
}

#[tokio::test]
async fn catalog_source_slices_requested_page() {
    let app = setup_test_app().await;

    let (status, json) = get(
        &app.router,
        "/v1/sources/vinted/search?q=tee&page=2&per_page=25",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 25);
    assert_eq!(json["data"][0]["Title"], "Tee 25");
    assert_eq!(json["data"][24]["Title"], "Tee 49");
    assert_eq!(json["pagination"]["current_page"], 2);
    assert_eq!(json["pagination"]["total_items"], CATALOG_ITEMS);
    assert_eq!(json["pagination"]["has_more"], true);

    let (_, last) = get(
        &app.router,
        "/v1/sources/vinted/search?q=tee&page=3&per_page=25",
    )
    .await;
    assert_eq!(last["count"], 10);
    assert_eq!(last["pagination"]["has_more"], false);
}

#[tokio::test]
async fn price_filter_recomputes_total() {
    let app = setup_test_app().await;

    let (_, json) = get(
        &app.router,
        "/v1/sources/vinted/search?q=tee&min_price=10&max_price=14",
    )
    .await;
    assert_eq!(json["count"], 5);
    assert_eq!(json["pagination"]["total_items"], 5);
    assert_eq!(json["pagination"]["has_more"], false);
}

#[tokio::test]
async fn source_names_are_case_insensitive() {
    let app = setup_test_app().await;
    let (status, _) = get(&app.router, "/v1/sources/Vinted/search?q=tee").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_source_returns_404() {
    let app = setup_test_app().await;

    let (status, json) = get(&app.router, "/v1/sources/depop/search?q=bag").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "unknown_source");
    assert_eq!(app.upstream.calls(), 0);
}

#[tokio::test]
async fn invalid_request_returns_400() {
    let app = setup_test_app().await;

    for uri in [
        "/v1/sources/vinted/search?q=bag&page=0",
        "/v1/sources/vinted/search?q=bag&per_page=501",
        "/v1/sources/vinted/search?q=bag&min_price=200&max_price=100",
        "/v1/sources/vinted/search?q=bag&status=reserved",
        "/v1/sources/vinted/search?q=bag&page=18446744073709551615",
    ] {
        let (status, json) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["error"], "invalid_request", "{uri}");
    }
    assert_eq!(app.upstream.calls(), 0);
}

#[tokio::test]
async fn failing_upstream_serves_placeholder_data() {
    let app = setup_broken_app().await;

    let (status, json) = get(&app.router, "/v1/sources/vestiaire/search?q=bag").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["origin"], "fallback");
    assert_eq!(json["count"], 23);
    assert_eq!(json["pagination"]["current_page"], 1);
    assert_eq!(json["pagination"]["total_pages"], 1);
    assert_eq!(json["pagination"]["has_more"], false);
    assert!(
        json["data"][0]["Title"]
            .as_str()
            .unwrap()
            .starts_with("[sample]")
    );
    assert!(json["error"].as_str().unwrap().contains("HTTP 500"));

    // The placeholder page is cached under the same key.
    let (_, again) = get(&app.router, "/v1/sources/vestiaire/search?q=bag").await;
    assert_eq!(again["origin"], "cached");
    assert_eq!(again["success"], false);
    assert_eq!(app.upstream.calls(), 1);
}

#[tokio::test]
async fn slow_upstream_returns_504() {
    let app = setup_slow_app().await;

    let (status, json) = get(&app.router, "/v1/sources/vestiaire/search?q=bag").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"], "transport_error");

    let snapshot = app.state.source("vestiaire").unwrap().safeguards().snapshot();
    assert_eq!(snapshot.active_fetches, 0);
    assert_eq!(snapshot.cache.size, 0);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_lists_every_source() {
    let app = setup_test_app().await;

    let (status, json) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");

    let sources = json["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["name"], "vestiaire");
    assert_eq!(sources[1]["name"], "vinted");
    assert_eq!(sources[0]["breaker_state"], "closed");
    assert_eq!(sources[0]["current_limit"], 20);
    assert_eq!(sources[0]["max_concurrent"], 2);
}

#[tokio::test]
async fn health_reports_open_breaker_as_degraded() {
    let app = setup_broken_app().await;

    for page in 1..=3 {
        let (_, json) = get(
            &app.router,
            &format!("/v1/sources/vinted/search?q=bag&page={page}"),
        )
        .await;
        assert_eq!(json["origin"], "fallback");
    }

    let (status, json) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    let vinted = &json["sources"][1];
    assert_eq!(vinted["breaker_state"], "open");
    assert_eq!(vinted["healthy"], false);
    assert!(vinted["retry_after_secs"].as_u64().unwrap() > 0);
    // Each failure shrinks the limit by 20%: 20 -> 16 -> 12 -> 9.
    assert_eq!(vinted["current_limit"], 9);
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_without_token_returns_401() {
    let app = setup_test_app().await;

    let (status, json) = send(&app.router, reset_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn reset_with_wrong_token_returns_401() {
    let app = setup_test_app().await;

    let (status, _) = send(&app.router, reset_request(Some("wrong-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reset_without_configured_token_returns_403() {
    let app = setup_test_app_no_auth().await;

    let (status, json) = send(&app.router, reset_request(Some("any-token"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn reset_clears_cache_and_closes_breakers() {
    let app = setup_broken_app().await;

    for page in 1..=3 {
        get(
            &app.router,
            &format!("/v1/sources/vinted/search?q=bag&page={page}"),
        )
        .await;
    }

    let (status, json) = send(&app.router, reset_request(Some(TEST_ADMIN_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reset"], serde_json::json!(["vestiaire", "vinted"]));

    let (_, health) = get(&app.router, "/health").await;
    let vinted = &health["sources"][1];
    assert_eq!(health["status"], "healthy");
    assert_eq!(vinted["breaker_state"], "closed");
    assert_eq!(vinted["failure_count"], 0);
    assert_eq!(vinted["current_limit"], 20);
    assert_eq!(vinted["cache"]["size"], 0);

    // Cache is empty, so the next search goes upstream again.
    let before = app.upstream.calls();
    get(&app.router, "/v1/sources/vinted/search?q=bag&page=1").await;
    assert_eq!(app.upstream.calls(), before + 1);
}

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let (status, json) = get(&app.router, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/v1/sources/{source}/search"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer"].is_object());
}
