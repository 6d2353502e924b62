//! HTTP surface: envelopes, status codes and token handling.

mod common;

use actix_web::{http::StatusCode, test, web, App};
use advisory_api::auth::{JwtAuth, JwtKeys};
use advisory_api::handlers;
use advisory_api::models::{AdviserInfo, AdviserKpi};
use advisory_api::store::Store;
use common::{adviser, investor, test_app, TestApp, FIXED_CODE};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "integration-test-secret";

fn keys() -> Arc<JwtKeys> {
    Arc::new(JwtKeys::new(SECRET, 3600))
}

macro_rules! init_app {
    ($app:expr) => {
        test::init_service(
            App::new()
                .wrap(JwtAuth::new(keys()))
                .app_data(web::Data::new($app.service.clone()))
                .configure(handlers::configure_routes),
        )
        .await
    };
}

fn bearer(user_id: i64, username: &str) -> (&'static str, String) {
    let token = keys().issue(user_id, username).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

async fn seed_adviser(app: &TestApp, username: &str, success_ratio: rust_decimal::Decimal) -> i64 {
    let user = adviser(app, username).await;
    app.store
        .save_adviser_profile(
            AdviserInfo {
                user_id: user.id,
                title: Some("CFA".to_string()),
                title_certificate: "A0001".to_string(),
                experience: "ten years".to_string(),
                good_at: "banks".to_string(),
            },
            AdviserKpi {
                user_id: user.id,
                success_ratio,
                accumulate_profit_ratio: dec!(0.1),
            },
        )
        .await
        .unwrap();
    user.id
}

#[actix_web::test]
async fn test_health() {
    let app = test_app();
    let service = init_app!(app);

    let resp = test::call_service(&service, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_protected_route_requires_token() {
    let app = test_app();
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::get().uri("/api/v1/cur_user_info").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_invalid_token_is_rejected() {
    let app = test_app();
    let service = init_app!(app);

    let err = test::try_call_service(
        &service,
        test::TestRequest::get()
            .uri("/api/v1/invest_adviser/search")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request(),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_current_user_info() {
    let app = test_app();
    let user = investor(&app, "alice").await;
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri("/api/v1/cur_user_info")
            .insert_header(bearer(user.id, &user.username))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["gender_cn"], "保密");
    assert!(body["data"].get("password_hash").is_none());
}

#[actix_web::test]
async fn test_malformed_json_is_logical_failure() {
    let app = test_app();
    let user = investor(&app, "alice").await;
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/user/follow_invest_adviser")
            .insert_header(bearer(user.id, &user.username))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], json!({}));
}

#[actix_web::test]
async fn test_follow_and_cancel_via_api() {
    let app = test_app();
    let user = investor(&app, "alice").await;
    let a = seed_adviser(&app, "adviser_a", dec!(0.5)).await;
    let b = seed_adviser(&app, "adviser_b", dec!(0.9)).await;
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/user/follow_invest_adviser")
            .insert_header(bearer(user.id, &user.username))
            .set_json(json!({ "ids": format!("{},{}", a, b) }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["followeeids"], json!([a, b]));

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri(&format!("/api/v1/invest_adviser/{}/base_info", a))
            .insert_header(bearer(user.id, &user.username))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["fans"], 1);
    assert_eq!(body["data"]["is_follow"], true);
    assert_eq!(body["data"]["is_sign_contract"], false);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/user/follow_invest_adviser?action=cancel")
            .insert_header(bearer(user.id, &user.username))
            .set_json(json!({ "ids": a.to_string() }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["cancel_followeeids"], json!([a]));

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri(&format!("/api/v1/user/{}/statistic", a))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["fans_count"], 0);
}

#[actix_web::test]
async fn test_adviser_search_puts_followed_first() {
    let app = test_app();
    let user = investor(&app, "alice").await;
    let low = seed_adviser(&app, "adviser_low", dec!(0.2)).await;
    let high = seed_adviser(&app, "adviser_high", dec!(0.8)).await;
    let service = init_app!(app);

    test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/user/follow_invest_adviser")
            .insert_header(bearer(user.id, &user.username))
            .set_json(json!({ "ids": low.to_string() }))
            .to_request(),
    )
    .await;

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri("/api/v1/invest_adviser/search?type=2")
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["advisers"]["count"], 2);
    assert_eq!(body["data"]["advisers"]["results"][0]["id"], high);

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri("/api/v1/invest_adviser/search?type=2")
            .insert_header(bearer(user.id, &user.username))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["advisers"]["results"][0]["id"], low);
    assert_eq!(body["data"]["advisers"]["results"][0]["is_follow"], true);
}

#[actix_web::test]
async fn test_zero_page_is_rejected() {
    let app = test_app();
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri("/api/v1/portfolio/search?page=0")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_register_flow() {
    let app = test_app();
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/send_securitycode")
            .set_json(json!({ "mobile": "13800138000" }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["expire_secs"], 300);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/user_register")
            .set_json(json!({
                "mobile": "13800138000",
                "security_code": "0000",
                "password": "secret-pass"
            }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/user_register")
            .set_json(json!({
                "mobile": "13800138000",
                "security_code": FIXED_CODE,
                "password": "secret-pass"
            }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "mob_13800138000");
    let user_id = body["data"]["id"].as_i64().unwrap();
    assert!(app.store.get_statistic(user_id).await.unwrap().is_some());

    // The code is single use.
    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/forget_passwd")
            .set_json(json!({
                "mobile": "13800138000",
                "security_code": FIXED_CODE,
                "password": "another-pass"
            }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_investor_cannot_publish() {
    let app = test_app();
    let user = investor(&app, "alice").await;
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/adviser/viewpoint")
            .insert_header(bearer(user.id, &user.username))
            .set_json(json!({ "title": "t", "digest": "", "content": "c" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_share_viewpoint() {
    let app = test_app();
    let owner = adviser(&app, "adviser").await;
    let service = init_app!(app);

    let resp = test::call_service(
        &service,
        test::TestRequest::post()
            .uri("/api/v1/adviser/viewpoint")
            .insert_header(bearer(owner.id, &owner.username))
            .set_json(json!({ "title": "Outlook", "digest": "d", "content": "<p>hold</p>" }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_i64().unwrap();

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri(&format!("/api/v1/invest_viewpoint/{}/share", id))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["url"].as_str().unwrap().starts_with("http://t.cn/"));

    let resp = test::call_service(
        &service,
        test::TestRequest::get()
            .uri(&format!("/api/v1/invest_adviser/{}/invest_viewpoint", owner.id))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let first = &body["data"]["viewpoints"]["results"][0];
    assert_eq!(first["content"], "hold");
    assert!(first.get("invest_adviser").is_none());
}
