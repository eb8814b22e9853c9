use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use market_common::{Money, Secret};
use market_engine::{
    db_types::{NewOrder, Order, OrderStatusType, EVENT_STATUS_CHANGED},
    events::EventProducers,
    test_utils::{
        prepare_env::{drop_database, prepare_test_env},
        StubGateway,
    },
    traits::{CheckoutUrls, GatewayError, GatewayPayment, GatewayPaymentStatus, PaymentPurpose},
    CheckoutApi,
    OrderFlowApi,
    OrderFlowConfig,
    PaymentReconciler,
    SqliteDatabase,
};

use super::{
    helpers::{json, send_request},
    mocks::MockGateway,
};
use crate::{
    data_objects::JsonResponse,
    helpers::calculate_hmac,
    middleware::{SignatureMiddlewareFactory, REQUEST_ID_HEADER, SIGNATURE_HEADER},
    webhook_routes::MercadopagoWebhookRoute,
};

const WEBHOOK_SECRET: &str = "whsec-test";

fn flow_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), OrderFlowConfig::default(), EventProducers::default())
}

fn configure(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let reconciler = PaymentReconciler::new(flow_api(&db), gateway);
        cfg.service(MercadopagoWebhookRoute::<SqliteDatabase, MockGateway>::new()).app_data(web::Data::new(reconciler));
    }
}

fn configure_signed(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let reconciler = PaymentReconciler::new(flow_api(&db), gateway);
        let scope = web::scope("/webhooks")
            .wrap(SignatureMiddlewareFactory::new(Secret::new(WEBHOOK_SECRET.to_string()), true))
            .service(MercadopagoWebhookRoute::<SqliteDatabase, MockGateway>::new());
        cfg.service(scope).app_data(web::Data::new(reconciler));
    }
}

/// Creates an order and runs it through checkout so that it is awaiting payment.
async fn order_awaiting_payment(db: &SqliteDatabase, total: i64) -> Order {
    let flow = flow_api(db);
    let order = NewOrder::new("bob", "listing-7", Money::from(total)).with_seller("sally");
    let order = flow.create_order(order, "bob").await.expect("Error creating order");
    let checkout = CheckoutApi::new(flow, StubGateway::default());
    let result = checkout.start_order_checkout(order.id, None, CheckoutUrls::default()).await.expect("Checkout failed");
    assert_eq!(result.order.status, OrderStatusType::PaymentPending);
    result.order
}

fn order_payment(id: &str, reference: &str, status: GatewayPaymentStatus, amount: i64) -> GatewayPayment {
    GatewayPayment {
        id: id.to_string(),
        status,
        purpose: Some(PaymentPurpose::OrderPayment),
        external_reference: Some(reference.to_string()),
        amount: Some(Money::from(amount)),
    }
}

fn notification(payment_id: &str) -> TestRequest {
    TestRequest::post()
        .uri("/mercadopago")
        .set_json(serde_json::json!({ "action": "payment.updated", "type": "payment", "data": { "id": payment_id } }))
}

#[actix_web::test]
async fn approved_payment_marks_the_order_paid_once() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let order = order_awaiting_payment(&db, 75_000).await;
    let reference = order.id.value().to_string();

    let gateway_for = |reference: String| {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_payment()
            .withf(|id| id == "5551")
            .times(1)
            .returning(move |_| Ok(order_payment("5551", &reference, GatewayPaymentStatus::Approved, 75_000)));
        gateway
    };

    let (status, body) = send_request(notification("5551"), configure(db.clone(), gateway_for(reference.clone()))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: JsonResponse = json(&body);
    assert!(response.success);
    assert!(response.message.starts_with("Applied approved"), "{}", response.message);
    let paid = flow_api(&db).order_by_id(order.id).await.unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(paid.payment_id.as_deref(), Some("5551"));

    // Redelivery of the same notification changes nothing
    let (status, body) = send_request(notification("5551"), configure(db.clone(), gateway_for(reference))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: JsonResponse = json(&body);
    assert!(response.message.ends_with("was already settled"), "{}", response.message);
    let events = flow_api(&db).fetch_order(order.id).await.unwrap().events;
    // Created, checked out and paid
    assert_eq!(events.len(), 3);
    assert_eq!(events.iter().filter(|e| e.event_type == EVENT_STATUS_CHANGED).count(), 2);
    drop_database(db).await;
}

#[actix_web::test]
async fn rejected_payment_fails_the_order() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let order = order_awaiting_payment(&db, 20_000).await;
    let reference = order.id.value().to_string();
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_payment()
        .returning(move |_| Ok(order_payment("42", &reference, GatewayPaymentStatus::Rejected, 20_000)));
    let (status, body) = send_request(notification("42"), configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let failed = flow_api(&db).order_by_id(order.id).await.unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);
    drop_database(db).await;
}

#[actix_web::test]
async fn unknown_reference_is_a_404() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_payment()
        .returning(|_| Ok(order_payment("77", "999999", GatewayPaymentStatus::Approved, 1000)));
    let (status, body) = send_request(notification("77"), configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("999999"), "{body}");
    drop_database(db).await;
}

#[actix_web::test]
async fn gateway_outage_asks_for_redelivery() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let order = order_awaiting_payment(&db, 20_000).await;
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().returning(|_| Err(GatewayError::Unavailable("502 Bad Gateway".into())));
    let (status, _) = send_request(notification("88"), configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let unchanged = flow_api(&db).order_by_id(order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatusType::PaymentPending);
    drop_database(db).await;
}

#[actix_web::test]
async fn other_topics_are_acknowledged_without_a_lookup() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().never();
    let req = TestRequest::post().uri("/mercadopago?topic=merchant_order&id=123");
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: JsonResponse = json(&body);
    assert!(response.message.starts_with("Ignored"), "{}", response.message);
    drop_database(db).await;
}

#[actix_web::test]
async fn malformed_bodies_are_rejected() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().never();
    let req = TestRequest::post().uri("/mercadopago").insert_header(("content-type", "application/json")).set_payload("{");
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    drop_database(db).await;
}

#[actix_web::test]
async fn unsigned_notifications_are_refused() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().never();
    let req = TestRequest::post()
        .uri("/webhooks/mercadopago?data.id=777&type=payment")
        .set_json(serde_json::json!({ "type": "payment", "data": { "id": "777" } }));
    let (status, body) = send_request(req, configure_signed(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains(SIGNATURE_HEADER), "{body}");
    drop_database(db).await;
}

#[actix_web::test]
async fn signed_notifications_are_checked() {
    let url = prepare_test_env().await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let v1 = calculate_hmac(WEBHOOK_SECRET, b"id:777;request-id:req-9;ts:1704908010;");
    let signature = format!("ts=1704908010,v1={v1}");
    let signed = |uri: &str| {
        TestRequest::post()
            .uri(uri)
            .insert_header((SIGNATURE_HEADER, signature.clone()))
            .insert_header((REQUEST_ID_HEADER, "req-9"))
            .set_json(serde_json::json!({ "type": "payment", "data": { "id": "777" } }))
    };

    // The signature covers data.id, so a different id in the query fails the check
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().never();
    let (status, _) =
        send_request(signed("/webhooks/mercadopago?data.id=778&type=payment"), configure_signed(db.clone(), gateway))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A payment that does not reference anything of ours is acknowledged and ignored
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().times(1).returning(|id| {
        Ok(GatewayPayment {
            id: id.to_string(),
            status: GatewayPaymentStatus::Approved,
            purpose: None,
            external_reference: None,
            amount: None,
        })
    });
    let (status, body) =
        send_request(signed("/webhooks/mercadopago?data.id=777&type=payment"), configure_signed(db.clone(), gateway))
            .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: JsonResponse = json(&body);
    assert!(response.message.contains("no usable reference"), "{}", response.message);

    // The signed id is the decoded one
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().withf(|id| id == "777").times(1).returning(|id| {
        Ok(GatewayPayment {
            id: id.to_string(),
            status: GatewayPaymentStatus::Approved,
            purpose: None,
            external_reference: None,
            amount: None,
        })
    });
    let (status, body) =
        send_request(signed("/webhooks/mercadopago?data.id=7%377&type=pay%6Dent"), configure_signed(db.clone(), gateway))
            .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    drop_database(db).await;
}
