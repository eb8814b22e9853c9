use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{Dispute, Order, OrderEvent, OrderId, OrderItem, OrderStatusType, WalletPosting};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub listing_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_buyer_id<S: Into<String>>(mut self, buyer_id: S) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    pub fn with_seller_id<S: Into<String>>(mut self, seller_id: S) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub fn with_listing_id<S: Into<String>>(mut self, listing_id: S) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The page size to use. Always between 1 and [`MAX_PAGE_SIZE`].
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_id.is_none() &&
            self.seller_id.is_none() &&
            self.listing_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters. ")?;
        }
        if let Some(buyer_id) = &self.buyer_id {
            write!(f, "buyer_id: {buyer_id}. ")?;
        }
        if let Some(seller_id) = &self.seller_id {
            write!(f, "seller_id: {seller_id}. ")?;
        }
        if let Some(listing_id) = &self.listing_id {
            write!(f, "listing_id: {listing_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        write!(f, "limit {}, offset {}", self.page_size(), self.page_offset())
    }
}

/// An order with everything hanging off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub events: Vec<OrderEvent>,
    pub disputes: Vec<Dispute>,
}

/// A validated status change, ready to be written by the storage backend.
///
/// Everything that must happen atomically with the status update travels in this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub order_id: OrderId,
    /// The update only applies if the order is still in this status.
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub actor: String,
    /// The payload of the `status_changed` event. Already contains `from` and `to`.
    pub event_payload: Value,
    /// Ledger postings to apply alongside the status change.
    pub postings: Vec<WalletPosting>,
    /// The gateway payment id to record on the order, if any.
    pub payment_id: Option<String>,
    /// Stamp `paid_out_at`.
    pub paid_out: bool,
}

impl StatusChange {
    pub fn new<S: Into<String>>(order_id: OrderId, from: OrderStatusType, to: OrderStatusType, actor: S) -> Self {
        let event_payload = serde_json::json!({ "from": from, "to": to });
        Self {
            order_id,
            from,
            to,
            actor: actor.into(),
            event_payload,
            postings: vec![],
            payment_id: None,
            paid_out: false,
        }
    }

    /// Merges the fields of `payload` into the event payload. `from` and `to` cannot be overridden.
    pub fn with_payload(mut self, payload: Value) -> Self {
        if let (Value::Object(extra), Value::Object(target)) = (payload, &mut self.event_payload) {
            for (k, v) in extra {
                if k != "from" && k != "to" {
                    target.insert(k, v);
                }
            }
        }
        self
    }

    pub fn with_posting(mut self, posting: WalletPosting) -> Self {
        self.postings.push(posting);
        self
    }

    pub fn with_payment_id<S: Into<String>>(mut self, payment_id: S) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    pub fn mark_paid_out(mut self) -> Self {
        self.paid_out = true;
        self
    }
}

/// The counts of rows removed by an order deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedOrder {
    pub order_id: OrderId,
    pub events: u64,
    pub items: u64,
    pub disputes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    pub actor: String,
    #[serde(default)]
    pub expected_status: Option<OrderStatusType>,
    #[serde(default)]
    pub payload: Option<Value>,
}
