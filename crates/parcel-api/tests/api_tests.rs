//! Integration tests for the API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, backed by the in-memory adapters from
//! `parcel-core` and a fixed clock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chrono::NaiveDate;
use parcel_api::{AppState, build_router};
use parcel_core::memory::{
    MemoryCalculationLog, MemoryPackageRepository, MemoryRateSource, MemoryTemporaryStorage,
};
use parcel_core::{Backends, FixedClock, RateTable, Services};
use parcel_types::UserId;
use serde_json::{Value, json};
use tower::ServiceExt;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()
}

fn make_router(rate_source: MemoryRateSource) -> Router {
    let services = Services::assemble(
        Backends {
            repository: Arc::new(MemoryPackageRepository::with_default_types()),
            calculation_log: Arc::new(MemoryCalculationLog::new()),
            storage: Arc::new(MemoryTemporaryStorage::new()),
            rate_source: Arc::new(rate_source),
            clock: Arc::new(FixedClock::at_noon(today())),
        },
        "USD",
    );
    build_router(Arc::new(AppState::new(services)))
}

fn usd_router() -> Router {
    make_router(MemoryRateSource::new(RateTable::from_pairs([("USD", 90.0)])))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

fn cookie(user: &str) -> String {
    format!("session_id={user}")
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(user) = user {
        builder = builder.header(header::COOKIE, cookie(user));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, user: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(header::COOKIE, cookie(user));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

async fn start_session(router: &Router) -> String {
    let response = send(router, get("/start_session", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(set_cookie.starts_with("session_id="));
    let json = body_to_json(response.into_body()).await;
    json["session_id"].as_str().unwrap().to_owned()
}

async fn register(router: &Router, user: &str, weight: f64, value: f64, type_id: i32) -> i64 {
    let body = json!({
        "name": "Parcel",
        "weight": weight,
        "content_value": value,
        "type_id": type_id,
    });
    let response = send(router, post_json("/packages/register", Some(user), &body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_to_json(response.into_body()).await["id"].as_i64().unwrap()
}

fn assert_close(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
}

#[tokio::test]
async fn test_start_session_reuses_valid_cookie() {
    let router = usd_router();
    let user = start_session(&router).await;

    let response = send(&router, get("/start_session", Some(&user))).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["session_id"], user.as_str());
}

#[tokio::test]
async fn test_package_types_sorted() {
    let router = usd_router();
    let response = send(&router, get("/package-types", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["clothing", "electronics", "miscellaneous"]);
}

#[tokio::test]
async fn test_register_requires_session() {
    let router = usd_router();
    let body = json!({"name": "x", "weight": 1.0, "content_value": 1.0, "type_id": 1});
    let response = send(&router, post_json("/packages/register", None, &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 401);
}

#[tokio::test]
async fn test_register_validation_and_unknown_type() {
    let router = usd_router();
    let user = start_session(&router).await;

    let bad = json!({"name": "x", "weight": 0.0, "content_value": 1.0, "type_id": 1});
    let response = send(&router, post_json("/packages/register", Some(&user), &bad)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = json!({"name": "x", "weight": 1.0, "content_value": 1.0, "type_id": 99});
    let response = send(&router, post_json("/packages/register", Some(&user), &unknown)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_calculation_costs_packages() {
    let router = usd_router();
    let user = start_session(&router).await;
    let id = register(&router, &user, 1.5, 100.0, 1).await;

    let response = send(&router, post_empty("/run_calculation")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Calculation is complete.");
    assert_eq!(json["report"]["outcome"], "completed");
    assert_eq!(json["report"]["packages_costed"], 1);

    let response = send(&router, get(&format!("/packages/{id}"), Some(&user))).await;
    let json = body_to_json(response.into_body()).await;
    assert_close(&json["delivery_cost"], 157.5);
    assert_eq!(json["package_type"]["name"], "clothing");
}

#[tokio::test]
async fn test_run_calculation_acknowledges_when_rate_unavailable() {
    let router = make_router(MemoryRateSource::unavailable());
    let user = start_session(&router).await;
    let id = register(&router, &user, 1.5, 100.0, 1).await;

    let response = send(&router, post_empty("/run_calculation")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Calculation is complete.");
    assert_eq!(json["report"]["outcome"], "rate_unavailable");

    let response = send(&router, get(&format!("/packages/{id}"), Some(&user))).await;
    let json = body_to_json(response.into_body()).await;
    assert!(json["delivery_cost"].is_null());
}

#[tokio::test]
async fn test_my_packages_filters_and_pages() {
    let router = usd_router();
    let user = start_session(&router).await;
    for type_id in [1, 2, 1] {
        register(&router, &user, 1.0, 10.0, type_id).await;
    }

    let response = send(&router, get("/my-packages?type_id=1&limit=1&offset=1", Some(&user))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_items"], 2);
    assert_eq!(json["page"], 2);
    assert_eq!(json["page_size"], 1);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    send(&router, post_empty("/run_calculation")).await;
    let response = send(
        &router,
        get("/my-packages?delivery_cost_calculated=false", Some(&user)),
    )
    .await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_items"], 0);
}

#[tokio::test]
async fn test_package_hidden_from_other_users() {
    let router = usd_router();
    let owner = start_session(&router).await;
    let id = register(&router, &owner, 1.0, 1.0, 3).await;

    let stranger = UserId::new().to_string();
    let response = send(&router, get(&format!("/packages/{id}"), Some(&stranger))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, get("/packages/424242", Some(&owner))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assign_conflict_and_not_found() {
    let router = usd_router();
    let user = start_session(&router).await;
    let id = register(&router, &user, 1.0, 1.0, 1).await;
    let uri = format!("/packages/{id}/assign");

    let response = send(&router, post_json(&uri, None, &json!({"company_id": 7}))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&router, post_json(&uri, None, &json!({"company_id": 8}))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &router,
        post_json("/packages/999/assign", None, &json!({"company_id": 7})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_aggregated_data_sums_today() {
    let router = usd_router();
    let user = start_session(&router).await;
    register(&router, &user, 1.5, 100.0, 2).await;
    register(&router, &user, 1.5, 100.0, 2).await;
    send(&router, post_empty("/run_calculation")).await;

    let response = send(&router, post_empty("/aggregated_data?date=2024-05-03")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["package_type_id"], 2);
    assert_eq!(rows[0]["date"], "2024-05-03");
    assert_close(&rows[0]["delivery_cost_sum"], 315.0);

    let response = send(
        &router,
        post_empty("/aggregated_data?date=2024-05-04T00:00:00Z"),
    )
    .await;
    let json = body_to_json(response.into_body()).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_aggregated_data_rejects_bad_date() {
    let router = usd_router();
    let response = send(&router, post_empty("/aggregated_data?date=tomorrow")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
}
