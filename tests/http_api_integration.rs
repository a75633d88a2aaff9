//! HTTP-level tests of the router: envelopes, status codes, the webhook
//! signature check and the admin key.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use mobilepay_bridge::adapters::http::middleware::ADMIN_KEY_HEADER;
use mobilepay_bridge::adapters::http::{app_router, AppState};
use mobilepay_bridge::adapters::memory::InMemoryStore;
use mobilepay_bridge::adapters::mobilepay::MockRecurringProvider;
use mobilepay_bridge::application::billing::{
    BillingServices, DownstreamNotifier, Repositories, SchedulerSettings,
};
use mobilepay_bridge::config::ServerConfig;
use mobilepay_bridge::domain::webhook::{sign_payload, WebhookVerifier, SIGNATURE_HEADER};

const WEBHOOK_SECRET: &str = "whsec_bridge_test";
const ADMIN_KEY: &str = "admin-key-for-tests";

// =============================================================================
// Test Infrastructure
// =============================================================================

fn app() -> Router {
    let services = BillingServices::build(
        Arc::new(MockRecurringProvider::new()),
        Repositories::shared(Arc::new(InMemoryStore::new())),
        DownstreamNotifier::disabled(),
        SchedulerSettings::default(),
        |_| None,
    );
    let verifier = WebhookVerifier::new(Some(SecretString::new(WEBHOOK_SECRET.to_string())), false);
    let state = AppState::new(services, verifier)
        .with_admin_key(Some(SecretString::new(ADMIN_KEY.to_string())));
    app_router(state, &ServerConfig::default())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_request(body: &'static [u8], signature: Option<String>) -> Request<Body> {
    let mut builder = Request::post("/api/webhooks/mobilepay").header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).unwrap()
}

fn sign_up_body() -> Value {
    json!({
        "customer": {"email": "karen@example.dk", "name": "Karen Hansen"},
        "planType": "monthly",
        "amount": "299.00",
        "productName": "Yoga Online"
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_memory_storage() {
    let (status, json) = send(app(), Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "memory");
}

// =============================================================================
// Public API
// =============================================================================

#[tokio::test]
async fn sign_up_returns_created_agreement() {
    let (status, json) = send(app(), post_json("/api/agreements", &sign_up_body())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    let agreement = &json["data"]["agreement"];
    assert_eq!(agreement["status"], "pending");
    assert_eq!(agreement["amount"], 29900);
    assert_eq!(agreement["currency"], "DKK");
    assert_eq!(agreement["subscriptions"][0]["planType"], "monthly");
    assert!(json["data"]["confirmationUrl"].is_string());
}

#[tokio::test]
async fn invalid_sign_up_lists_every_field() {
    let body = json!({
        "customer": {"email": "nope", "name": ""},
        "planType": "monthly",
        "amount": "0",
        "productName": "Yoga Online"
    });
    let (status, json) = send(app(), post_json("/api/agreements", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
    let fields: Vec<&str> = json["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["amount", "customer.email", "customer.name"]);
}

#[tokio::test]
async fn oversized_amount_is_a_validation_error() {
    let mut body = sign_up_body();
    body["amount"] = json!("79228162514264337593543950335");
    let (status, json) = send(app(), post_json("/api/agreements", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(json["error"]["details"][0]["field"], "amount");
}

#[tokio::test]
async fn unknown_plan_type_is_rejected() {
    let mut body = sign_up_body();
    body["planType"] = json!("weekly");
    let (status, json) = send(app(), post_json("/api/agreements", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_PLAN_TYPE");
}

#[tokio::test]
async fn unknown_agreement_is_404() {
    let request = Request::get("/api/agreements/agr_missing").body(Body::empty()).unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

// =============================================================================
// Webhooks
// =============================================================================

const CHARGED: &[u8] = br#"{"merchantId":"123456","timestamp":"2026-03-04T12:00:00Z","event":"charge-charged","data":{"agreementId":"agr_1","chargeId":"chr_1"}}"#;

#[tokio::test]
async fn signed_webhook_is_acknowledged() {
    let signature = sign_payload(WEBHOOK_SECRET, CHARGED);
    let (status, json) = send(app(), webhook_request(CHARGED, Some(signature))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true}));
}

#[tokio::test]
async fn unsigned_webhook_is_accepted_when_signatures_are_optional() {
    let (status, _) = send(app(), webhook_request(CHARGED, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bad_signature_is_401() {
    let signature = sign_payload("some-other-secret", CHARGED);
    let (status, json) = send(app(), webhook_request(CHARGED, Some(signature))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn non_utf8_signature_header_is_401() {
    const STOPPED: &[u8] = br#"{"merchantId":"123456","timestamp":"2026-03-04T12:00:00Z","event":"agreement-stopped","data":{"agreementId":"agr_1"}}"#;
    let signature = HeaderValue::from_bytes(b"\xffbogus").unwrap();
    let request = Request::post("/api/webhooks/mobilepay")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(STOPPED))
        .unwrap();

    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn unreadable_webhook_is_400() {
    const GARBAGE: &[u8] = b"not json";
    let signature = sign_payload(WEBHOOK_SECRET, GARBAGE);
    let (status, json) = send(app(), webhook_request(GARBAGE, Some(signature))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_PAYLOAD");
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn admin_requires_key() {
    let request = Request::get("/api/admin/stats").body(Body::empty()).unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn admin_stats_with_key() {
    let request = Request::get("/api/admin/stats")
        .header(ADMIN_KEY_HEADER, ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["activeSubscriptions"], 0);
}

#[tokio::test]
async fn admin_upcoming_window_is_bounded() {
    let request = Request::get("/api/admin/charges/upcoming?days=400")
        .header(ADMIN_KEY_HEADER, ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn admin_scheduler_run_reports_empty_sweep() {
    let request = Request::post("/api/admin/scheduler/run")
        .header(ADMIN_KEY_HEADER, ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, json) = tokio::time::timeout(Duration::from_secs(5), send(app(), request))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["processed"], 0);
}
