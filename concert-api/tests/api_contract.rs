use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use concert_api::{app, AppState};
use concert_store::app_config::{AuthConfig, BusinessRules, Config, DatabaseConfig, NotificationConfig, ServerConfig};
use concert_store::MemoryStore;

const SHOW: &str = "2027-03-01T20:00:00";

fn config(hold_seconds: u64, token_ttl_seconds: u64) -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: DatabaseConfig::default(),
        auth: AuthConfig {
            token_ttl_seconds,
            password_pepper: "test-pepper".to_string(),
            admin_usernames: vec!["admin".to_string()],
        },
        business_rules: BusinessRules {
            reservation_hold_seconds: hold_seconds,
            purge_interval_seconds: 60,
        },
        notifications: NotificationConfig::default(),
    }
}

fn build_test_app_with(config: Config) -> Router {
    app(AppState::in_memory(Arc::new(MemoryStore::with_sample_catalog()), &config))
}

fn build_test_app() -> Router {
    build_test_app_with(config(300, 300))
}

struct Reply {
    status: StatusCode,
    authorization: Option<String>,
    body: Value,
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("expected request to build");

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let authorization = response
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply {
        status,
        authorization,
        body,
    }
}

async fn register(app: &Router, username: &str) -> String {
    let reply = send(
        app,
        "POST",
        "/v1/users",
        None,
        Some(json!({
            "username": username,
            "password": "pw",
            "first_name": "Test",
            "last_name": "User",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply.authorization.expect("expected Authorization header")
}

async fn add_card(app: &Router, token: &str) {
    let reply = send(
        app,
        "POST",
        "/v1/users/payment",
        Some(token),
        Some(json!({
            "card_type": "Visa",
            "name": "Test User",
            "number": "4111 1111 1111 1111",
            "expiry_date": "2030-12-31",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

fn reservation(seats: u32, band: &str, date: &str) -> Value {
    json!({
        "number_of_seats": seats,
        "seat_type": band,
        "concert_id": 1,
        "date": date,
    })
}

#[tokio::test]
async fn when_listing_catalog_then_sample_data_is_returned() {
    let app = build_test_app();

    let concerts = send(&app, "GET", "/v1/concerts", None, None).await;
    assert_eq!(concerts.status, StatusCode::OK);
    assert_eq!(concerts.body.as_array().unwrap().len(), 2);
    assert_eq!(concerts.body[0]["tariff"]["PriceBandA"], 15000);

    let performer = send(&app, "GET", "/v1/performers/2", None, None).await;
    assert_eq!(performer.body["name"], "Gravel Road");

    let missing = send(&app, "GET", "/v1/concerts/99", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert!(missing.body["error"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn when_registering_then_duplicates_and_missing_fields_are_rejected() {
    let app = build_test_app();
    let token = register(&app, "alice").await;
    assert!(token.starts_with("Bearer "));

    let duplicate = send(
        &app,
        "POST",
        "/v1/users",
        None,
        Some(json!({"username": "alice", "password": "x", "first_name": "A", "last_name": "B"})),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let incomplete = send(&app, "POST", "/v1/users", None, Some(json!({"username": "bob", "password": "x"}))).await;
    assert_eq!(incomplete.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn when_logging_in_then_live_token_is_reused() {
    let app = build_test_app();
    let token = register(&app, "alice").await;

    let unknown = send(&app, "POST", "/v1/users/login", None, Some(json!({"username": "nobody", "password": "pw"}))).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let wrong = send(&app, "POST", "/v1/users/login", None, Some(json!({"username": "alice", "password": "nope"}))).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let missing = send(&app, "POST", "/v1/users/login", None, Some(json!({"username": "alice"}))).await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);

    let ok = send(&app, "POST", "/v1/users/login", None, Some(json!({"username": "alice", "password": "pw"}))).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.authorization.as_deref(), Some(token.as_str()));
    assert_eq!(ok.body["first_name"], "Test");
    assert!(ok.body.get("password").is_none());
}

#[tokio::test]
async fn when_token_has_lapsed_then_requests_fail_and_login_rotates_it() {
    let app = build_test_app_with(config(300, 0));
    let token = register(&app, "alice").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let stale = send(&app, "GET", "/v1/bookings", Some(&token), None).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let ok = send(&app, "POST", "/v1/users/login", None, Some(json!({"username": "alice", "password": "pw"}))).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_ne!(ok.authorization.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn when_token_is_missing_or_unknown_then_403_or_401() {
    let app = build_test_app();

    let anonymous = send(&app, "POST", "/v1/reservations", None, Some(reservation(2, "PriceBandA", SHOW))).await;
    assert_eq!(anonymous.status, StatusCode::FORBIDDEN);

    let forged = send(
        &app,
        "POST",
        "/v1/reservations",
        Some("Bearer not-a-token"),
        Some(reservation(2, "PriceBandA", SHOW)),
    )
    .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn when_reserving_then_seats_are_contiguous_and_never_shared() {
    let app = build_test_app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let first = send(&app, "POST", "/v1/reservations", Some(&alice), Some(reservation(3, "PriceBandA", SHOW))).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["seats"], json!([
        {"row": "E", "number": 1},
        {"row": "E", "number": 2},
        {"row": "E", "number": 3},
    ]));

    let second = send(&app, "POST", "/v1/reservations", Some(&bob), Some(reservation(2, "PriceBandA", SHOW))).await;
    assert_eq!(second.body["seats"][0], json!({"row": "E", "number": 4}));

    let too_many = send(&app, "POST", "/v1/reservations", Some(&bob), Some(reservation(27, "PriceBandA", SHOW))).await;
    assert_eq!(too_many.status, StatusCode::CONFLICT);

    let wrong_date = send(
        &app,
        "POST",
        "/v1/reservations",
        Some(&bob),
        Some(reservation(1, "PriceBandA", "2027-03-05T20:00:00")),
    )
    .await;
    assert_eq!(wrong_date.status, StatusCode::NOT_FOUND);

    let incomplete = send(&app, "POST", "/v1/reservations", Some(&bob), Some(json!({"number_of_seats": 2}))).await;
    assert_eq!(incomplete.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn when_confirming_then_card_ownership_and_state_are_enforced() {
    let app = build_test_app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let reserved = send(&app, "POST", "/v1/reservations", Some(&alice), Some(reservation(2, "PriceBandC", SHOW))).await;
    let id = reserved.body["id"].as_str().unwrap().to_string();
    let confirm_uri = format!("/v1/reservations/{}/confirm", id);

    let no_card = send(&app, "POST", &confirm_uri, Some(&alice), None).await;
    assert_eq!(no_card.status, StatusCode::PAYMENT_REQUIRED);

    add_card(&app, &alice).await;
    add_card(&app, &bob).await;

    let not_yours = send(&app, "POST", &confirm_uri, Some(&bob), None).await;
    assert_eq!(not_yours.status, StatusCode::NOT_FOUND);

    let confirmed = send(&app, "POST", &confirm_uri, Some(&alice), None).await;
    assert_eq!(confirmed.status, StatusCode::NO_CONTENT);

    let again = send(&app, "POST", &confirm_uri, Some(&alice), None).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let bookings = send(&app, "GET", "/v1/bookings", Some(&alice), None).await;
    let bookings = bookings.body.as_array().unwrap().clone();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["concert_title"], "Aurora Lights Live");
    assert_eq!(bookings[0]["total_cents"], 16000);

    let bobs = send(&app, "GET", "/v1/bookings", Some(&bob), None).await;
    assert_eq!(bobs.body, json!([]));
}

#[tokio::test]
async fn when_hold_has_lapsed_then_confirm_is_gone_and_seats_are_reused() {
    let app = build_test_app_with(config(0, 300));
    let alice = register(&app, "alice").await;
    add_card(&app, &alice).await;

    let reserved = send(&app, "POST", "/v1/reservations", Some(&alice), Some(reservation(4, "PriceBandB", SHOW))).await;
    let id = reserved.body["id"].as_str().unwrap();

    let late = send(&app, "POST", &format!("/v1/reservations/{}/confirm", id), Some(&alice), None).await;
    assert_eq!(late.status, StatusCode::GONE);

    let again = send(&app, "POST", "/v1/reservations", Some(&alice), Some(reservation(4, "PriceBandB", SHOW))).await;
    assert_eq!(again.body["seats"], reserved.body["seats"]);
}

#[tokio::test]
async fn when_registering_invalid_card_then_422() {
    let app = build_test_app();
    let alice = register(&app, "alice").await;

    let short = send(
        &app,
        "POST",
        "/v1/users/payment",
        Some(&alice),
        Some(json!({"card_type": "Master", "name": "A", "number": "1234", "expiry_date": "2030-01-31"})),
    )
    .await;
    assert_eq!(short.status, StatusCode::UNPROCESSABLE_ENTITY);

    let expired = send(
        &app,
        "POST",
        "/v1/users/payment",
        Some(&alice),
        Some(json!({"card_type": "Master", "name": "A", "number": "5500000000000004", "expiry_date": "2020-01-31"})),
    )
    .await;
    assert_eq!(expired.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn when_non_admin_manages_catalog_then_forbidden() {
    let app = build_test_app();
    let alice = register(&app, "alice").await;

    let reply = send(
        &app,
        "POST",
        "/v1/performers",
        Some(&alice),
        Some(json!({"name": "Night Owls", "genre": "Metal"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let anonymous = send(&app, "PUT", "/v1/performers/1/image", None, Some(json!({"image_name": "x.jpg"}))).await;
    assert_eq!(anonymous.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn when_admin_manages_catalog_then_changes_are_visible() {
    let app = build_test_app();
    let admin = register(&app, "admin").await;

    let performer = send(
        &app,
        "POST",
        "/v1/performers",
        Some(&admin),
        Some(json!({"name": "Night Owls", "genre": "Metal"})),
    )
    .await;
    assert_eq!(performer.status, StatusCode::CREATED);
    let performer_id = performer.body["id"].as_i64().unwrap();

    let concert = send(
        &app,
        "POST",
        "/v1/concerts",
        Some(&admin),
        Some(json!({
            "title": "Owls at Midnight",
            "dates": ["2027-06-01T23:00:00"],
            "tariff": {"PriceBandA": 100, "PriceBandB": 80, "PriceBandC": 60},
            "performer_ids": [performer_id],
        })),
    )
    .await;
    assert_eq!(concert.status, StatusCode::CREATED);
    assert_eq!(concert.body["id"], 3);

    let no_band = send(
        &app,
        "POST",
        "/v1/concerts",
        Some(&admin),
        Some(json!({"title": "Half Priced", "dates": ["2027-06-02T20:00:00"], "tariff": {"PriceBandA": 1}})),
    )
    .await;
    assert_eq!(no_band.status, StatusCode::UNPROCESSABLE_ENTITY);

    let ghost = send(
        &app,
        "POST",
        "/v1/concerts",
        Some(&admin),
        Some(json!({
            "title": "Ghost Show",
            "dates": ["2027-06-03T20:00:00"],
            "tariff": {"PriceBandA": 1, "PriceBandB": 1, "PriceBandC": 1},
            "performer_ids": [404],
        })),
    )
    .await;
    assert_eq!(ghost.status, StatusCode::NOT_FOUND);

    let image = send(
        &app,
        "PUT",
        &format!("/v1/performers/{}/image", performer_id),
        Some(&admin),
        Some(json!({"image_name": "owls.png"})),
    )
    .await;
    assert_eq!(image.status, StatusCode::OK);
    assert_eq!(image.body["image_name"], "owls.png");

    let unknown = send(&app, "PUT", "/v1/performers/404/image", Some(&admin), Some(json!({"image_name": "x.png"}))).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn when_subscribed_then_matching_notifications_stream_as_sse() {
    let app = build_test_app();
    let admin = register(&app, "admin").await;

    let request = Request::builder()
        .uri("/v1/notifications/images?performer_id=2")
        .header(header::AUTHORIZATION, &admin)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut frames = response.into_body().into_data_stream();

    // Performer 1 is filtered out, performer 2 comes through
    for (id, image) in [(1, "one.png"), (2, "two.png")] {
        let reply = send(
            &app,
            "PUT",
            &format!("/v1/performers/{}/image", id),
            Some(&admin),
            Some(json!({"image_name": image})),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
        .await
        .expect("expected an event before the timeout")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: performer_image_updated"));
    assert!(text.contains("two.png"));
    assert!(!text.contains("one.png"));
}
