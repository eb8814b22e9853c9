use cucumber::{given, then, when};
use market_engine::{
    db_types::{Money, NewOrder, OrderStatusType, WalletTransactionType},
    payment_objects::{PaymentNotification, ReconciliationOutcome},
    traits::{CheckoutUrls, GatewayPaymentStatus},
};

use crate::cucumber::MarketWorld;

fn units(amount: String) -> Money {
    let cents = amount.parse::<f64>().map(|v| (v * 100.0).round() as i64).expect("Not a valid amount");
    Money::from(cents)
}

#[given(expr = "'{word}' orders '{word}' from '{word}' for {word}")]
async fn create_order(world: &mut MarketWorld, buyer: String, listing: String, seller: String, total: String) {
    let order = NewOrder::new(buyer.clone(), listing, units(total)).with_seller(seller);
    let order = world.system().flow.create_order(order, &buyer).await.expect("Error creating order");
    world.current_order = Some(order.id);
}

#[when("the buyer starts the checkout")]
async fn start_checkout(world: &mut MarketWorld) {
    let id = world.order_id();
    world.system().checkout.start_order_checkout(id, None, CheckoutUrls::default()).await.expect("Error in checkout");
}

#[when(expr = "the gateway reports payment {word} as {word} for {word}")]
async fn gateway_reports(world: &mut MarketWorld, payment_id: String, status: String, amount: String) {
    let status = match status.as_str() {
        "approved" => GatewayPaymentStatus::Approved,
        "rejected" => GatewayPaymentStatus::Rejected,
        "cancelled" => GatewayPaymentStatus::Cancelled,
        other => GatewayPaymentStatus::InProgress(other.to_string()),
    };
    let id = world.order_id();
    world.system().gateway.add_order_payment(&payment_id, id.value(), status, units(amount));
}

#[when(expr = "the webhook for payment {word} arrives {int} time(s)")]
async fn webhook_arrives(world: &mut MarketWorld, payment_id: String, times: u32) {
    for _ in 0..times {
        let notification = PaymentNotification::payment(payment_id.clone());
        let outcome = world.system().reconciler.handle_notification(notification).await.expect("Webhook failed");
        assert!(!matches!(outcome, ReconciliationOutcome::Ignored { .. }), "Webhook was ignored: {outcome}");
    }
}

#[when(expr = "'{word}' moves the order to {word}")]
async fn move_order(world: &mut MarketWorld, actor: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Not a valid status");
    let id = world.order_id();
    match world.system().flow.transition(id, status, &actor, None, None).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "'{word}' opens a dispute because {string}")]
async fn open_dispute(world: &mut MarketWorld, actor: String, reason: String) {
    let id = world.order_id();
    world.system().flow.open_dispute(id, &actor, &reason).await.expect("Error opening dispute");
}

#[when(expr = "the admin resolves the dispute as {word}")]
async fn resolve_dispute(world: &mut MarketWorld, outcome: String) {
    let outcome = outcome.parse::<OrderStatusType>().expect("Not a valid status");
    let id = world.order_id();
    let disputes = world.system().flow.fetch_order(id).await.expect("Error fetching order").disputes;
    let dispute = disputes.last().expect("The order has no dispute");
    let flow = &world.system().flow;
    flow.resolve_dispute(dispute.id, "Resolved by support", outcome, "admin").await.expect("Error resolving dispute");
}

#[then(expr = "the order status is {word}")]
async fn check_status(world: &mut MarketWorld, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Not a valid status");
    let order = world.system().flow.order_by_id(world.order_id()).await.expect("Error fetching order");
    assert_eq!(order.status, expected);
}

#[then(expr = "the order platform fee is {word}")]
async fn check_fee(world: &mut MarketWorld, fee: String) {
    let order = world.system().flow.order_by_id(world.order_id()).await.expect("Error fetching order");
    assert_eq!(order.platform_fee, units(fee));
}

#[then(expr = "the transition is rejected with {string}")]
async fn check_rejected(world: &mut MarketWorld, message: String) {
    let err = world.last_error.as_ref().expect("The transition was not rejected");
    assert!(err.contains(&message), "Unexpected error: {err}");
}

#[then(expr = "the wallet of '{word}' has a balance of {word}")]
async fn check_balance(world: &mut MarketWorld, user: String, balance: String) {
    let wallet = world.system().wallets.wallet_for_user(&user).await.expect("Wallet does not exist");
    assert_eq!(wallet.balance, units(balance));
}

#[then(expr = "'{word}' has no wallet")]
async fn check_no_wallet(world: &mut MarketWorld, user: String) {
    assert!(world.system().wallets.wallet_for_user(&user).await.is_err(), "{user} has a wallet");
}

#[then(expr = "the wallet of '{word}' has {int} {word} entry/entries")]
async fn check_entries(world: &mut MarketWorld, user: String, count: usize, kind: String) {
    let txs = world.system().wallets.transactions_for_user(&user).await.expect("Error fetching transactions");
    let n = txs.iter().filter(|t| t.transaction_type.to_string() == kind).count();
    assert_eq!(n, count, "{txs:?}");
    world.system().wallets.audit_wallet(&user).await.expect("Ledger audit failed");
}

#[then(expr = "the order has {int} {word} event(s)")]
async fn check_events(world: &mut MarketWorld, count: usize, event_type: String) {
    let events = world.system().flow.fetch_order(world.order_id()).await.expect("Error fetching order").events;
    let n = events.iter().filter(|e| e.event_type == event_type).count();
    assert_eq!(n, count);
}

#[then(expr = "a SALE_CREDIT is referenced to the order")]
async fn check_sale_reference(world: &mut MarketWorld) {
    let id = world.order_id().value().to_string();
    let flow = &world.system().flow;
    let seller = flow.order_by_id(world.order_id()).await.expect("Error fetching order").seller_id.expect("No seller");
    let txs = world.system().wallets.transactions_for_user(&seller).await.expect("Error fetching transactions");
    let sale = txs.iter().find(|t| t.transaction_type == WalletTransactionType::SaleCredit).expect("No sale credit");
    assert_eq!(sale.reference_id.as_deref(), Some(id.as_str()));
}
