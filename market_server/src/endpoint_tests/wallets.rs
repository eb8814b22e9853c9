use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use market_common::Money;
use market_engine::{
    db_types::{ConversationKind, Wallet, WalletTransaction, WalletTransactionType},
    ConversationApi,
    WalletApi,
};
use serde_json::Value;

use super::{
    helpers::{json, send_request},
    mocks::{MockConversationStore, MockWalletStore},
};
use crate::routes::{AdjustBalanceRoute, ConversationKindRoute, WalletAuditRoute, WalletRoute, WalletTransactionsRoute};

fn wallet(balance: i64) -> Wallet {
    let ts = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
    Wallet {
        id: 7,
        user_id: "alice".into(),
        balance: Money::from(balance),
        total_deposited: Money::from(balance),
        total_earned: Money::default(),
        total_spent: Money::default(),
        created_at: ts,
        updated_at: ts,
    }
}

fn deposit(id: i64, amount: i64, balance_after: i64) -> WalletTransaction {
    WalletTransaction {
        id,
        wallet_id: 7,
        transaction_type: WalletTransactionType::Deposit,
        amount: Money::from(amount),
        balance_after: Money::from(balance_after),
        reference_type: Some("credit_purchase".into()),
        reference_id: Some(id.to_string()),
        status: "completed".into(),
        description: None,
        created_at: Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap(),
    }
}

fn configure_with(store: MockWalletStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(WalletRoute::<MockWalletStore>::new())
            .service(WalletTransactionsRoute::<MockWalletStore>::new())
            .service(WalletAuditRoute::<MockWalletStore>::new())
            .service(AdjustBalanceRoute::<MockWalletStore>::new())
            .app_data(web::Data::new(WalletApi::new(store)));
    }
}

#[actix_web::test]
async fn fetch_wallet() {
    let _ = env_logger::try_init().ok();
    let mut store = MockWalletStore::new();
    store.expect_fetch_wallet_for_user().times(1).returning(|_| Ok(Some(wallet(52_500))));
    let (status, body) = send_request(TestRequest::get().uri("/wallets/alice"), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let wallet: Wallet = json(&body);
    assert_eq!(wallet.balance, Money::from_units(525));
}

#[actix_web::test]
async fn missing_wallet_is_a_404() {
    let _ = env_logger::try_init().ok();
    let mut store = MockWalletStore::new();
    store.expect_fetch_wallet_for_user().returning(|_| Ok(None));
    store.expect_fetch_wallet_transactions().never();
    let (status, body) = send_request(TestRequest::get().uri("/wallets/nobody/transactions"), configure_with(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"No wallet exists for nobody"}"#);
}

#[actix_web::test]
async fn audit_passes_for_a_consistent_ledger() {
    let _ = env_logger::try_init().ok();
    let mut store = MockWalletStore::new();
    store.expect_fetch_wallet_for_user().returning(|_| Ok(Some(wallet(1500))));
    store.expect_fetch_wallet_transactions().returning(|_| Ok(vec![deposit(1, 1000, 1000), deposit(2, 500, 1500)]));
    let (status, body) = send_request(TestRequest::get().uri("/wallets/alice/audit"), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let audit: Value = json(&body);
    assert_eq!(audit["transaction_count"], serde_json::json!(2));
    assert_eq!(audit["ledger_sum"], serde_json::json!(1500));
}

#[actix_web::test]
async fn audit_reports_drift_as_a_server_error() {
    let _ = env_logger::try_init().ok();
    let mut store = MockWalletStore::new();
    store.expect_fetch_wallet_for_user().returning(|_| Ok(Some(wallet(1501))));
    store.expect_fetch_wallet_transactions().returning(|_| Ok(vec![deposit(1, 1000, 1000), deposit(2, 500, 1500)]));
    let (status, body) = send_request(TestRequest::get().uri("/wallets/alice/audit"), configure_with(store)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Ledger inconsistency detected"), "{body}");
}

#[actix_web::test]
async fn zero_adjustments_are_rejected_before_touching_the_store() {
    let _ = env_logger::try_init().ok();
    let mut store = MockWalletStore::new();
    store.expect_post_to_user().never();
    let req = TestRequest::post()
        .uri("/wallets/alice/adjust")
        .set_json(serde_json::json!({ "amount": 0, "reason": "typo", "actor": "admin" }));
    let (status, _) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn adjustments_are_posted_to_the_user() {
    let _ = env_logger::try_init().ok();
    let mut store = MockWalletStore::new();
    store
        .expect_post_to_user()
        .withf(|p| {
            p.user_id == "alice" &&
                p.transaction_type == WalletTransactionType::Adjustment &&
                p.amount == Money::from(-250) &&
                p.reference_id.is_none()
        })
        .times(1)
        .returning(|p| {
            let mut tx = deposit(9, -250, 1250);
            tx.transaction_type = p.transaction_type;
            tx.reference_type = p.reference_type;
            tx.reference_id = None;
            Ok(tx)
        });
    let req = TestRequest::post()
        .uri("/wallets/alice/adjust")
        .set_json(serde_json::json!({ "amount": -250, "reason": "Chargeback", "actor": "support" }));
    let (status, body) = send_request(req, configure_with(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let tx: WalletTransaction = json(&body);
    assert_eq!(tx.balance_after, Money::from(1250));
}

#[actix_web::test]
async fn conversation_kinds() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockConversationStore::new();
        store.expect_conversation_kind().returning(|id| match id {
            "c-direct" => Ok(Some(ConversationKind::Direct)),
            "c-order" => Ok(Some(ConversationKind::Order)),
            _ => Ok(None),
        });
        cfg.service(ConversationKindRoute::<MockConversationStore>::new())
            .app_data(web::Data::new(ConversationApi::new(store)));
    };
    let (status, body) = send_request(TestRequest::get().uri("/conversations/c-order/kind"), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"conversation_id":"c-order","kind":"order"}"#);
    let (status, _) = send_request(TestRequest::get().uri("/conversations/c-gone/kind"), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
