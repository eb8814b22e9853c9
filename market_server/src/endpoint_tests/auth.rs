use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use market_common::Secret;
use market_engine::{fees::FeeConfig, FeeApi};

use super::{helpers::send_request, mocks::MockFeeTierStore};
use crate::{
    middleware::{ApiKeyMiddlewareFactory, ADMIN_KEY_HEADER, API_KEY_HEADER},
    routes::{health, FeeQuoteRoute, FeeTiersRoute},
};

const USER_KEY: &str = "user-key-123";
const ADMIN_KEY: &str = "admin-key-456";

fn configure_keys(api_key: &'static str, admin_key: &'static str) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut store = MockFeeTierStore::new();
        store.expect_fetch_active_fee_tiers().returning(|| Ok(vec![]));
        store.expect_fetch_all_fee_tiers().returning(|| Ok(vec![]));
        let admin_scope = web::scope("/api/admin")
            .wrap(ApiKeyMiddlewareFactory::new(ADMIN_KEY_HEADER, Secret::new(admin_key.to_string())))
            .service(FeeTiersRoute::<MockFeeTierStore>::new());
        let api_scope = web::scope("/api")
            .wrap(ApiKeyMiddlewareFactory::new(API_KEY_HEADER, Secret::new(api_key.to_string())))
            .service(FeeQuoteRoute::<MockFeeTierStore>::new());
        cfg.app_data(web::Data::new(FeeApi::new(store, FeeConfig::default())))
            .service(health)
            .service(admin_scope)
            .service(api_scope);
    }
}

fn quote_request() -> TestRequest {
    TestRequest::post().uri("/api/fees/quote").set_json(serde_json::json!({ "amount": 2500 }))
}

#[actix_web::test]
async fn health_needs_no_key() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/health"), configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn missing_api_key() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(quote_request(), configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("A valid X-Api-Key header is required."), "{body}");
}

#[actix_web::test]
async fn wrong_api_key() {
    let _ = env_logger::try_init().ok();
    let req = quote_request().insert_header((API_KEY_HEADER, "guess"));
    let (status, _) = send_request(req, configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn valid_api_key() {
    let _ = env_logger::try_init().ok();
    let req = quote_request().insert_header((API_KEY_HEADER, USER_KEY));
    let (status, body) = send_request(req, configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""total_fee":1000"#), "{body}");
}

#[actix_web::test]
async fn user_key_does_not_open_admin_routes() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/api/admin/fee_tiers").insert_header((ADMIN_KEY_HEADER, USER_KEY));
    let (status, _) = send_request(req, configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get().uri("/api/admin/fee_tiers").insert_header((API_KEY_HEADER, USER_KEY));
    let (status, _) = send_request(req, configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get().uri("/api/admin/fee_tiers").insert_header((ADMIN_KEY_HEADER, ADMIN_KEY));
    let (status, body) = send_request(req, configure_keys(USER_KEY, ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn unconfigured_key_denies_everyone() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/api/admin/fee_tiers").insert_header((ADMIN_KEY_HEADER, ""));
    let (status, _) = send_request(req, configure_keys(USER_KEY, "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
