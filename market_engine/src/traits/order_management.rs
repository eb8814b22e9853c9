use crate::{
    db_types::{Dispute, Money, NewDispute, NewOrder, Order, OrderEvent, OrderId, OrderItem},
    order_objects::{DeletedOrder, OrderQueryFilter, StatusChange},
    traits::MarketplaceError,
};

/// Storage behaviour for orders, their line items, their audit trail and their disputes.
///
/// Implementations never decide *whether* a status change is allowed. That is the job of
/// [`crate::OrderFlowApi`]. They only guarantee that an accepted change is applied atomically, and only if the order is
/// still in the status the caller expects.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order with the given platform fee, its line items, and an `order_created` event, in a single atomic
    /// transaction.
    async fn insert_order(&self, order: NewOrder, platform_fee: Money, actor: &str) -> Result<Order, MarketplaceError>;

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, MarketplaceError>;

    /// Fetches the audit trail for the order, oldest first.
    async fn fetch_order_events(&self, order_id: OrderId) -> Result<Vec<OrderEvent>, MarketplaceError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError>;

    /// Applies a status change in a single atomic transaction:
    /// * The order row is updated only if its status is still `change.from`. Otherwise nothing is written and
    ///   [`MarketplaceError::TransitionConflict`] is returned.
    /// * The relevant timestamp columns are stamped.
    /// * Exactly one `status_changed` event is appended.
    /// * Every posting in `change.postings` is applied to the ledger. Wallets are created on demand. If any posting
    ///   fails, the whole change is rolled back.
    async fn apply_status_change(&self, change: StatusChange) -> Result<Order, MarketplaceError>;

    /// Records the gateway checkout preference for the order.
    async fn set_order_preference(&self, order_id: OrderId, preference_id: &str) -> Result<Order, MarketplaceError>;

    /// Deletes the order together with its events, items and disputes. Either everything is removed, or nothing is.
    async fn delete_order(&self, order_id: OrderId) -> Result<DeletedOrder, MarketplaceError>;

    async fn fetch_dispute(&self, dispute_id: i64) -> Result<Option<Dispute>, MarketplaceError>;

    async fn fetch_disputes_for_order(&self, order_id: OrderId) -> Result<Vec<Dispute>, MarketplaceError>;

    /// Inserts the dispute and applies the accompanying status change in the same transaction.
    async fn open_dispute(&self, dispute: NewDispute, change: StatusChange)
        -> Result<(Dispute, Order), MarketplaceError>;

    /// Marks the dispute as resolved and applies the accompanying status change in the same transaction.
    ///
    /// Fails with [`MarketplaceError::DisputeAlreadyResolved`] if another resolution got there first.
    async fn resolve_dispute(
        &self,
        dispute_id: i64,
        resolution: &str,
        change: StatusChange,
    ) -> Result<(Dispute, Order), MarketplaceError>;
}
