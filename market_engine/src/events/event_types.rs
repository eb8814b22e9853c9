use serde::{Deserialize, Serialize};

use crate::db_types::{CreditPurchase, Money, Order, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub actor: String,
}

impl OrderStatusChangedEvent {
    pub fn new<S: Into<String>>(order: Order, old_status: OrderStatusType, actor: S) -> Self {
        Self { order, old_status, actor: actor.into() }
    }

    pub fn new_status(&self) -> OrderStatusType {
        self.order.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditsPurchasedEvent {
    pub purchase: CreditPurchase,
    /// Credits plus bonus
    pub total_credited: Money,
}

impl CreditsPurchasedEvent {
    pub fn new(purchase: CreditPurchase) -> Self {
        let total_credited = purchase.credits + purchase.bonus_credits;
        Self { purchase, total_credited }
    }
}
