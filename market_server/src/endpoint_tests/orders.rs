use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use market_common::Money;
use market_engine::{
    db_types::{Order, OrderStatusType},
    events::EventProducers,
    order_objects::{DeletedOrder, OrderResult},
    payment_objects::OrderCheckout,
    test_utils::{
        prepare_env::{drop_database, prepare_test_env},
        StubGateway,
    },
    CheckoutApi,
    OrderFlowApi,
    OrderFlowConfig,
    SqliteDatabase,
};
use serde_json::Value;

use super::helpers::{json, send_request};
use crate::routes::{
    CreateOrderRoute,
    DeleteOrderRoute,
    OrderByIdRoute,
    OrderCheckoutRoute,
    SearchOrdersRoute,
    UpdateOrderStatusRoute,
};

async fn test_db() -> SqliteDatabase {
    let url = prepare_test_env().await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database")
}

fn configure(db: SqliteDatabase, gateway: StubGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let flow = OrderFlowApi::new(db, OrderFlowConfig::default(), EventProducers::default());
        let checkout = CheckoutApi::new(flow.clone(), gateway);
        cfg.service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(OrderCheckoutRoute::<SqliteDatabase, StubGateway>::new())
            .service(DeleteOrderRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(flow))
            .app_data(web::Data::new(checkout));
    }
}

async fn create_order(db: &SqliteDatabase, gateway: &StubGateway, total: i64) -> Order {
    let req = TestRequest::post().uri("/orders").set_json(serde_json::json!({
        "buyer_id": "bob",
        "seller_id": "sally",
        "listing_id": "listing-42",
        "total_amount": total
    }));
    let (status, body) = send_request(req, configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)
}

#[actix_web::test]
async fn new_orders_carry_their_platform_fee() {
    let db = test_db().await;
    let gateway = StubGateway::default();
    // 2,500.00 falls in the 6% tier
    let order = create_order(&db, &gateway, 250_000).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.platform_fee, Money::from_units(150));
    assert_eq!(order.seller_receives(), Money::from(235_000));

    let uri = format!("/orders/{}", order.id.value());
    let (status, body) = send_request(TestRequest::get().uri(&uri), configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: OrderResult = json(&body);
    assert_eq!(result.order.id, order.id);
    assert_eq!(result.events.len(), 1);
    assert!(result.disputes.is_empty());
    drop_database(db).await;
}

#[actix_web::test]
async fn invalid_orders_are_rejected() {
    let db = test_db().await;
    let req = TestRequest::post().uri("/orders").set_json(serde_json::json!({
        "buyer_id": "bob",
        "listing_id": "listing-42",
        "total_amount": 0
    }));
    let (status, body) = send_request(req, configure(db.clone(), StubGateway::default())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("must be positive"), "{body}");
    drop_database(db).await;
}

#[actix_web::test]
async fn unknown_order_is_a_404() {
    let db = test_db().await;
    let (status, body) =
        send_request(TestRequest::get().uri("/orders/9999"), configure(db.clone(), StubGateway::default())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The requested order #9999 does not exist"}"#);
    drop_database(db).await;
}

#[actix_web::test]
async fn stale_status_updates_conflict() {
    let db = test_db().await;
    let gateway = StubGateway::default();
    let order = create_order(&db, &gateway, 50_000).await;
    let uri = format!("/orders/{}/status", order.id.value());
    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({
        "status": "cancelled",
        "actor": "bob",
        "expected_status": "paid"
    }));
    let (status, _) = send_request(req, configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({
        "status": "cancelled",
        "actor": "bob",
        "expected_status": "pending",
        "payload": { "reason": "Changed my mind" }
    }));
    let (status, body) = send_request(req, configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = json(&body);
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert!(order.cancelled_at.is_some());

    // Terminal orders stay put
    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({ "status": "paid", "actor": "bob" }));
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    drop_database(db).await;
}

#[actix_web::test]
async fn checkout_moves_the_order_to_payment_pending() {
    let db = test_db().await;
    let gateway = StubGateway::default();
    let order = create_order(&db, &gateway, 120_000).await;
    let uri = format!("/orders/{}/checkout", order.id.value());
    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({ "payer_email": "bob@example.com" }));
    let (status, body) = send_request(req, configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let checkout: OrderCheckout = json(&body);
    assert_eq!(checkout.order.status, OrderStatusType::PaymentPending);
    assert_eq!(checkout.checkout.checkout_url, "https://checkout.example/pref-order_payment-1");
    assert_eq!(checkout.order.preference_id.as_deref(), Some("pref-order_payment-1"));

    let requests = gateway.checkouts();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].external_reference, order.id.value().to_string());
    assert_eq!(requests[0].amount, Money::from(120_000));
    assert_eq!(requests[0].payer_email.as_deref(), Some("bob@example.com"));

    // A second checkout replaces the preference and leaves the status alone
    let (status, body) = send_request(TestRequest::post().uri(&uri), configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let checkout: OrderCheckout = json(&body);
    assert_eq!(checkout.order.preference_id.as_deref(), Some("pref-order_payment-2"));
    assert_eq!(checkout.order.status, OrderStatusType::PaymentPending);
    drop_database(db).await;
}

#[actix_web::test]
async fn search_by_status() {
    let db = test_db().await;
    let gateway = StubGateway::default();
    let first = create_order(&db, &gateway, 10_000).await;
    let _second = create_order(&db, &gateway, 20_000).await;
    let uri = format!("/orders/{}/status", first.id.value());
    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({ "status": "cancelled", "actor": "bob" }));
    let (status, _) = send_request(req, configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri("/orders?buyer_id=bob&status=pending");
    let (status, body) = send_request(req, configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let orders: Vec<Order> = json(&body);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].total_amount, Money::from(20_000));

    let req = TestRequest::get().uri("/orders?status=pending,bogus");
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    drop_database(db).await;
}

#[actix_web::test]
async fn delete_an_order() {
    let db = test_db().await;
    let gateway = StubGateway::default();
    let order = create_order(&db, &gateway, 10_000).await;
    let uri = format!("/orders/{}", order.id.value());
    let (status, body) = send_request(TestRequest::delete().uri(&uri), configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let deleted: DeletedOrder = json(&body);
    assert_eq!(deleted.order_id, order.id);
    assert_eq!(deleted.events, 1);

    let (status, _) = send_request(TestRequest::get().uri(&uri), configure(db.clone(), gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send_request(TestRequest::delete().uri(&uri), configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = json(&body);
    assert!(error["error"].as_str().is_some());
    drop_database(db).await;
}
