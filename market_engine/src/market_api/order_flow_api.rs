use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db_types::{
        Dispute,
        DisputeStatus,
        NewDispute,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        WalletPosting,
        WalletTransactionType,
    },
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    fees::{calculate_fees, FeeBreakdown, FeeConfig},
    order_objects::{DeletedOrder, OrderQueryFilter, OrderResult, StatusChange},
    traits::{MarketplaceDatabase, MarketplaceError},
};

pub const DEFAULT_PLATFORM_USER_ID: &str = "platform";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlowConfig {
    pub fee_config: FeeConfig,
    /// The wallet owner that receives the platform's cut when an order completes.
    pub platform_user_id: String,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self { fee_config: FeeConfig::default(), platform_user_id: DEFAULT_PLATFORM_USER_ID.to_string() }
    }
}

/// Decides whether an order may move from `from` to `to`.
///
/// | From                                   | Allowed targets                                                   |
/// |----------------------------------------|-------------------------------------------------------------------|
/// | `completed`, `cancelled`, `refunded`   | none                                                              |
/// | `pending`, `payment_pending`           | the other of the two, `paid`, `failed`, `cancelled`, `refunded`   |
/// | `failed`                               | `pending`, `payment_pending`, `cancelled`                         |
/// | `paid` and the fulfilment states       | another fulfilment state except `paid`, `completed`, `dispute`,   |
/// |                                        | `refunded`, `cancelled`                                           |
/// | `dispute`                              | `in_review`, `completed`, `refunded`, `cancelled`                 |
///
/// The fulfilment states are `processing`, `awaiting_seller`, `seller_accepted`, `in_delivery`,
/// `delivery_submitted` and `in_review`. Only `paid` stamps the payment confirmation, so `completed` is never
/// reachable from an order that has not been paid.
pub fn validate_transition(order_id: OrderId, from: OrderStatusType, to: OrderStatusType) -> Result<(), MarketplaceError> {
    use OrderStatusType::*;
    if from.is_terminal() {
        return Err(MarketplaceError::OrderAlreadyTerminal(order_id, from));
    }
    if from == to {
        return Err(MarketplaceError::TransitionNoOp(order_id, from));
    }
    let allowed = match from {
        Pending | PaymentPending => matches!(to, Pending | PaymentPending | Paid | Failed | Cancelled | Refunded),
        Failed => matches!(to, Pending | PaymentPending | Cancelled),
        Dispute => matches!(to, InReview | Completed | Refunded | Cancelled),
        _ if from.is_fulfilment() => {
            (to.is_fulfilment() && to != Paid) || matches!(to, Completed | Dispute | Refunded | Cancelled)
        },
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(MarketplaceError::TransitionForbidden { from, to })
    }
}

/// `OrderFlowApi` is the order status machine. Every order status change in the system goes through here.
///
/// Transitions are validated against the current status, then written with an optimistic guard on that status. Money
/// that moves because of a transition (seller payout, platform fee, buyer refund) is posted to the ledger in the same
/// database transaction as the status write.
pub struct OrderFlowApi<B> {
    db: B,
    config: OrderFlowConfig,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({})", self.config.platform_user_id)
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), config: self.config.clone(), producers: self.producers.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, config: OrderFlowConfig, producers: EventProducers) -> Self {
        Self { db, config, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &OrderFlowConfig {
        &self.config
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Prices and stores a new order. The platform fee is fixed at creation time from the fee tiers in force.
    pub async fn create_order(&self, order: NewOrder, actor: &str) -> Result<Order, MarketplaceError> {
        validate_new_order(&order)?;
        let fees = self.quote(&order).await?;
        if fees.seller_receives.is_negative() {
            return Err(MarketplaceError::ValidationError(format!(
                "An order of {} would not cover the minimum fee of {}",
                order.total_amount, fees.total_fee
            )));
        }
        let order = self.db.insert_order(order, fees.total_fee, actor).await?;
        info!(
            "📦️ Order {} created for buyer {}. Total {}, platform fee {} ({})",
            order.id, order.buyer_id, order.total_amount, order.platform_fee, fees.tier_description
        );
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(order)
    }

    async fn quote(&self, order: &NewOrder) -> Result<FeeBreakdown, MarketplaceError> {
        let tiers = self.db.fetch_active_fee_tiers().await?;
        let fees = calculate_fees(order.total_amount, &tiers, &self.config.fee_config)?;
        Ok(fees)
    }

    pub async fn fetch_order(&self, order_id: OrderId) -> Result<OrderResult, MarketplaceError> {
        let order = self.order_by_id(order_id).await?;
        let items = self.db.fetch_order_items(order_id).await?;
        let events = self.db.fetch_order_events(order_id).await?;
        let disputes = self.db.fetch_disputes_for_order(order_id).await?;
        Ok(OrderResult { order, items, events, disputes })
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        trace!("📦️ Searching orders. {query}");
        self.db.search_orders(query).await
    }

    pub async fn order_by_id(&self, order_id: OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))
    }

    /// Moves an order to `new_status`.
    ///
    /// If `expected` is given, the change only applies if the order is in that status. Otherwise the status read at
    /// the start of the call is used as the guard. Either way, a concurrent change that lands first makes this call
    /// fail with [`MarketplaceError::TransitionConflict`] and leaves the order untouched.
    ///
    /// ## Side effects
    /// * `completed`: the seller is credited with `seller_receives` and the platform wallet with the platform fee.
    /// * `refunded`: if the order had been paid, the buyer is credited with the full amount.
    /// * An `OrderStatusChangedEvent` is published once the change has committed.
    pub async fn transition(
        &self,
        order_id: OrderId,
        new_status: OrderStatusType,
        actor: &str,
        payload: Option<Value>,
        expected: Option<OrderStatusType>,
    ) -> Result<Order, MarketplaceError> {
        let order = self.order_by_id(order_id).await?;
        let mut change = self.prepare_change(&order, new_status, actor, expected)?;
        if let Some(payload) = payload {
            change = change.with_payload(payload);
        }
        self.commit_change(change).await
    }

    /// Validates a transition for `order` and works out everything that must be written with it.
    pub fn prepare_change(
        &self,
        order: &Order,
        to: OrderStatusType,
        actor: &str,
        expected: Option<OrderStatusType>,
    ) -> Result<StatusChange, MarketplaceError> {
        let from = expected.unwrap_or(order.status);
        if from != order.status {
            debug!("📦️ Order {} is {}, not {from} as expected", order.id, order.status);
            return Err(MarketplaceError::TransitionConflict(order.id, from));
        }
        validate_transition(order.id, from, to)?;
        let mut change = StatusChange::new(order.id, from, to, actor);
        match to {
            OrderStatusType::Completed => {
                let seller = order.seller_id.as_ref().filter(|s| !s.is_empty()).ok_or_else(|| {
                    MarketplaceError::ValidationError(format!("Order {} has no seller to pay out to", order.id))
                })?;
                let seller_receives = order.seller_receives();
                if seller_receives.is_positive() {
                    let posting = WalletPosting::new(seller.as_str(), WalletTransactionType::SaleCredit, seller_receives)
                        .for_order(order.id)
                        .with_description(format!("Sale proceeds for order {}", order.id));
                    change = change.with_posting(posting);
                }
                if order.platform_fee.is_positive() {
                    let posting = WalletPosting::new(
                        self.config.platform_user_id.as_str(),
                        WalletTransactionType::PlatformFee,
                        order.platform_fee,
                    )
                    .for_order(order.id)
                    .with_description(format!("Platform fee for order {}", order.id));
                    change = change.with_posting(posting);
                }
                change = change.mark_paid_out();
            },
            OrderStatusType::Refunded if order.confirmed_at.is_some() => {
                let posting =
                    WalletPosting::new(order.buyer_id.as_str(), WalletTransactionType::RefundCredit, order.total_amount)
                        .for_order(order.id)
                        .with_description(format!("Refund for order {}", order.id));
                change = change.with_posting(posting);
            },
            _ => {},
        }
        Ok(change)
    }

    /// Writes a prepared change and notifies subscribers.
    pub async fn commit_change(&self, change: StatusChange) -> Result<Order, MarketplaceError> {
        let from = change.from;
        let actor = change.actor.clone();
        let postings = change.postings.len();
        let order = self.db.apply_status_change(change).await?;
        info!("📦️ Order {} moved from {from} to {} by {actor}. {postings} ledger posting(s).", order.id, order.status);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(order.clone(), from, actor)).await;
        Ok(order)
    }

    /// Opens a dispute against the order and moves the order to `dispute`, atomically.
    pub async fn open_dispute(
        &self,
        order_id: OrderId,
        opened_by: &str,
        reason: &str,
    ) -> Result<(Dispute, Order), MarketplaceError> {
        if reason.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("A dispute needs a reason".to_string()));
        }
        let order = self.order_by_id(order_id).await?;
        let from = order.status;
        let change = self
            .prepare_change(&order, OrderStatusType::Dispute, opened_by, None)?
            .with_payload(json!({ "reason": reason }));
        let dispute = NewDispute { order_id, opened_by: opened_by.to_string(), reason: reason.to_string() };
        let (dispute, order) = self.db.open_dispute(dispute, change).await?;
        warn!("📦️ Dispute {} opened on order {order_id} by {opened_by}. {reason}", dispute.id);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(order.clone(), from, opened_by)).await;
        Ok((dispute, order))
    }

    /// Resolves a dispute and moves the order to the outcome, which must be `completed`, `refunded` or `cancelled`.
    pub async fn resolve_dispute(
        &self,
        dispute_id: i64,
        resolution: &str,
        outcome: OrderStatusType,
        actor: &str,
    ) -> Result<(Dispute, Order), MarketplaceError> {
        if !matches!(outcome, OrderStatusType::Completed | OrderStatusType::Refunded | OrderStatusType::Cancelled) {
            return Err(MarketplaceError::ValidationError(format!(
                "A dispute cannot be resolved by moving the order to {outcome}"
            )));
        }
        let dispute = self.db.fetch_dispute(dispute_id).await?.ok_or(MarketplaceError::DisputeNotFound(dispute_id))?;
        if dispute.status == DisputeStatus::Resolved {
            return Err(MarketplaceError::DisputeAlreadyResolved(dispute_id));
        }
        let order = self.order_by_id(dispute.order_id).await?;
        let from = order.status;
        let change = self
            .prepare_change(&order, outcome, actor, None)?
            .with_payload(json!({ "dispute_id": dispute_id, "resolution": resolution }));
        let (dispute, order) = self.db.resolve_dispute(dispute_id, resolution, change).await?;
        info!("📦️ Dispute {dispute_id} resolved by {actor}. Order {} is now {}", order.id, order.status);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(order.clone(), from, actor)).await;
        Ok((dispute, order))
    }

    /// Removes an order and everything that depends on it. Admin only.
    pub async fn delete_order(&self, order_id: OrderId) -> Result<DeletedOrder, MarketplaceError> {
        let result = self.db.delete_order(order_id).await?;
        warn!("📦️ Order {order_id} has been deleted");
        Ok(result)
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), MarketplaceError> {
    if !order.total_amount.is_positive() {
        return Err(MarketplaceError::ValidationError(format!(
            "The order total must be positive. Got {}",
            order.total_amount
        )));
    }
    if order.buyer_id.trim().is_empty() || order.listing_id.trim().is_empty() {
        return Err(MarketplaceError::ValidationError("An order needs a buyer and a listing".to_string()));
    }
    if order.seller_id.as_deref() == Some(order.buyer_id.as_str()) {
        return Err(MarketplaceError::ValidationError("A buyer cannot buy from themselves".to_string()));
    }
    if let Some(item) = order.items.iter().find(|i| i.quantity <= 0 || i.unit_price.is_negative()) {
        return Err(MarketplaceError::ValidationError(format!(
            "Invalid line item for listing {}. Quantity {} at {}",
            item.listing_id, item.quantity, item.unit_price
        )));
    }
    Ok(())
}
