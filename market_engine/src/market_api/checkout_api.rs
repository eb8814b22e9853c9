use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{CreditPackage, NewCreditPurchase, OrderId, OrderStatusType},
    market_api::order_flow_api::OrderFlowApi,
    payment_objects::{CreditCheckout, OrderCheckout},
    traits::{CheckoutRequest, CheckoutUrls, MarketplaceDatabase, MarketplaceError, PaymentGateway, PaymentPurpose},
};

pub const CHECKOUT_ACTOR: &str = "checkout";

/// Starts hosted checkouts with the payment gateway.
///
/// The gateway only ever learns two things about what is being paid for: the [`PaymentPurpose`] and the local record
/// id as `external_reference`. Those come back with the payment and are all the reconciler needs.
pub struct CheckoutApi<B, G> {
    flow: OrderFlowApi<B>,
    gateway: G,
    default_urls: CheckoutUrls,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({:?})", self.default_urls.notification)
    }
}

impl<B: Clone, G: Clone> Clone for CheckoutApi<B, G> {
    fn clone(&self) -> Self {
        Self { flow: self.flow.clone(), gateway: self.gateway.clone(), default_urls: self.default_urls.clone() }
    }
}

impl<B, G> CheckoutApi<B, G> {
    pub fn new(flow: OrderFlowApi<B>, gateway: G) -> Self {
        Self { flow, gateway, default_urls: CheckoutUrls::default() }
    }

    /// URLs used for any field the caller leaves empty. Usually only the notification URL is set here.
    pub fn with_default_urls(mut self, urls: CheckoutUrls) -> Self {
        self.default_urls = urls;
        self
    }

    fn urls(&self, requested: CheckoutUrls) -> CheckoutUrls {
        let defaults = self.default_urls.clone();
        CheckoutUrls {
            success: requested.success.or(defaults.success),
            failure: requested.failure.or(defaults.failure),
            pending: requested.pending.or(defaults.pending),
            notification: requested.notification.or(defaults.notification),
        }
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    /// Creates a gateway checkout for the full order amount and moves the order to `payment_pending`.
    ///
    /// Orders already in `payment_pending` get a fresh checkout, which replaces the stored preference. Orders whose
    /// payment `failed` may be checked out again.
    pub async fn start_order_checkout(
        &self,
        order_id: OrderId,
        payer_email: Option<String>,
        urls: CheckoutUrls,
    ) -> Result<OrderCheckout, MarketplaceError> {
        let order = self.flow.order_by_id(order_id).await?;
        match order.status {
            OrderStatusType::Pending | OrderStatusType::PaymentPending | OrderStatusType::Failed => {},
            s if s.is_terminal() => return Err(MarketplaceError::OrderAlreadyTerminal(order_id, s)),
            s => return Err(MarketplaceError::TransitionForbidden { from: s, to: OrderStatusType::PaymentPending }),
        }
        let request = CheckoutRequest {
            purpose: PaymentPurpose::OrderPayment,
            external_reference: order_id.value().to_string(),
            title: format!("Order {order_id}"),
            amount: order.total_amount,
            payer_email,
            urls: self.urls(urls),
        };
        let checkout = self.gateway.create_checkout(request).await?;
        debug!("💳️ Checkout {} created for order {order_id}", checkout.preference_id);
        let mut order = self.flow.db().set_order_preference(order_id, &checkout.preference_id).await?;
        if order.status != OrderStatusType::PaymentPending {
            let change = self.flow.prepare_change(&order, OrderStatusType::PaymentPending, CHECKOUT_ACTOR, None)?;
            order = self.flow.commit_change(change).await?;
        }
        info!("💳️ Order {order_id} is awaiting payment of {} via {}", order.total_amount, checkout.preference_id);
        Ok(OrderCheckout { order, checkout })
    }

    pub async fn credit_packages(&self) -> Result<Vec<CreditPackage>, MarketplaceError> {
        self.flow.db().fetch_credit_packages().await
    }

    /// Records a pending purchase of a credit package at its catalogue price and starts the gateway checkout for it.
    pub async fn start_credit_purchase(
        &self,
        user_id: &str,
        package_id: i64,
        payer_email: Option<String>,
        urls: CheckoutUrls,
    ) -> Result<CreditCheckout, MarketplaceError> {
        if user_id.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("A credit purchase needs a buyer".to_string()));
        }
        let db = self.flow.db();
        let package = db
            .fetch_credit_package(package_id)
            .await?
            .filter(|p| p.active)
            .ok_or(MarketplaceError::CreditPackageNotFound(package_id))?;
        let purchase = db.insert_credit_purchase(NewCreditPurchase::for_package(user_id, &package)).await?;
        let request = CheckoutRequest {
            purpose: PaymentPurpose::CreditPurchase,
            external_reference: purchase.id.to_string(),
            title: package.name.clone(),
            amount: purchase.price,
            payer_email,
            urls: self.urls(urls),
        };
        let checkout = match self.gateway.create_checkout(request).await {
            Ok(c) => c,
            Err(e) => {
                warn!("💳️ Credit purchase {} for {user_id} has no checkout. {e}", purchase.id);
                return Err(e.into());
            },
        };
        let purchase = db.set_credit_purchase_preference(purchase.id, &checkout.preference_id).await?;
        info!(
            "💳️ {user_id} started credit purchase {} of '{}' for {} via {}",
            purchase.id, package.name, purchase.price, checkout.preference_id
        );
        Ok(CreditCheckout { purchase, checkout })
    }
}
