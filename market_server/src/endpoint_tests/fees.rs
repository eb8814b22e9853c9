use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use market_common::Money;
use market_engine::{
    db_types::FeeTier,
    fees::{FeeBreakdown, FeeConfig},
    FeeApi,
};
use rust_decimal::Decimal;

use super::{
    helpers::{json, send_request},
    mocks::MockFeeTierStore,
};
use crate::routes::{AddFeeTierRoute, DeactivateFeeTierRoute, FeeQuoteRoute, FeeTiersRoute};

fn mid_tier() -> FeeTier {
    FeeTier {
        id: 2,
        min_value: Money::from_units(1000),
        max_value: Some(Money::from(499_999)),
        fee_percentage: Decimal::new(60, 1),
        description: "1,000 to 4,999.99".into(),
        active: true,
    }
}

fn configure_with(store: MockFeeTierStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(FeeQuoteRoute::<MockFeeTierStore>::new())
            .service(FeeTiersRoute::<MockFeeTierStore>::new())
            .service(AddFeeTierRoute::<MockFeeTierStore>::new())
            .service(DeactivateFeeTierRoute::<MockFeeTierStore>::new())
            .app_data(web::Data::new(FeeApi::new(store, FeeConfig::default())));
    }
}

#[actix_web::test]
async fn quote_uses_the_matching_tier() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_fetch_active_fee_tiers().times(1).returning(|| Ok(vec![mid_tier()]));
    let req = TestRequest::post().uri("/fees/quote").set_json(serde_json::json!({ "amount": 100_000 }));
    let (status, body) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let quote: FeeBreakdown = json(&body);
    assert_eq!(quote.total_fee, Money::from(6000));
    assert_eq!(quote.processor_fee, Money::from(5000));
    assert_eq!(quote.platform_fee, Money::from(1000));
    assert_eq!(quote.seller_receives, Money::from(94_000));
    assert_eq!(quote.tier_description, "1,000 to 4,999.99");
}

#[actix_web::test]
async fn quote_falls_back_and_applies_the_minimum() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_fetch_active_fee_tiers().returning(|| Ok(vec![mid_tier()]));
    // 50.00 matches no tier. 10% of it is below the 10.00 minimum
    let req = TestRequest::post().uri("/fees/quote").set_json(serde_json::json!({ "amount": 5000 }));
    let (status, body) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let quote: FeeBreakdown = json(&body);
    assert_eq!(quote.total_fee, Money::from_units(10));
    assert_eq!(quote.processor_fee, Money::from(250));
    assert_eq!(quote.platform_fee, Money::from(750));
    assert_eq!(quote.seller_receives, Money::from(4000));
    assert_eq!(quote.total_fee_percentage, Decimal::new(2000, 2));
}

#[actix_web::test]
async fn quote_rejects_non_positive_amounts() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_fetch_active_fee_tiers().returning(|| Ok(vec![mid_tier()]));
    let req = TestRequest::post().uri("/fees/quote").set_json(serde_json::json!({ "amount": 0 }));
    let (status, _) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn invalid_tiers_are_not_stored() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_insert_fee_tier().never();
    let req = TestRequest::post().uri("/fee_tiers").set_json(serde_json::json!({
        "min_value": 1000,
        "max_value": 500,
        "fee_percentage": "4.5",
        "description": "Upside down"
    }));
    let (status, body) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("upper bound"), "{body}");
}

#[actix_web::test]
async fn add_a_tier() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_insert_fee_tier().times(1).returning(|t| {
        Ok(FeeTier {
            id: 4,
            min_value: t.min_value,
            max_value: t.max_value,
            fee_percentage: t.fee_percentage,
            description: t.description,
            active: true,
        })
    });
    let req = TestRequest::post().uri("/fee_tiers").set_json(serde_json::json!({
        "min_value": 1_000_000,
        "fee_percentage": "4.5",
        "description": "Wholesale"
    }));
    let (status, body) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let tier: FeeTier = json(&body);
    assert_eq!(tier.id, 4);
    assert_eq!(tier.max_value, None);
    assert_eq!(tier.fee_percentage, Decimal::new(45, 1));
}

#[actix_web::test]
async fn deactivating_an_unknown_tier() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_set_fee_tier_active().withf(|id, active| *id == 99 && !*active).returning(|_, _| Ok(None));
    let (status, body) =
        send_request(TestRequest::post().uri("/fee_tiers/99/deactivate"), configure_with(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The requested fee tier 99 does not exist"}"#);
}

#[actix_web::test]
async fn list_all_tiers() {
    let _ = env_logger::try_init().ok();
    let mut store = MockFeeTierStore::new();
    store.expect_fetch_all_fee_tiers().returning(|| {
        let mut retired = mid_tier();
        retired.id = 1;
        retired.active = false;
        Ok(vec![retired, mid_tier()])
    });
    let (status, body) = send_request(TestRequest::get().uri("/fee_tiers"), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let tiers: Vec<FeeTier> = json(&body);
    assert_eq!(tiers.len(), 2);
    assert!(!tiers[0].active);
}
