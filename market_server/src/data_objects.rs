use std::fmt::Display;

use actix_web::web;
use chrono::{DateTime, Utc};
use market_common::Money;
use market_engine::{
    db_types::OrderStatusType,
    order_objects::OrderQueryFilter,
    traits::CheckoutUrls,
    MarketplaceError,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query string for `GET /api/orders`. Several statuses may be given as a comma-separated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub listing_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = MarketplaceError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let status = match params.status {
            Some(s) => Some(
                s.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.trim().parse::<OrderStatusType>())
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        Ok(OrderQueryFilter {
            buyer_id: params.buyer_id,
            seller_id: params.seller_id,
            listing_id: params.listing_id,
            since: params.since,
            until: params.until,
            status,
            limit: params.limit,
            offset: params.offset,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutParams {
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub urls: CheckoutUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCheckoutParams {
    pub user_id: String,
    pub package_id: i64,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub urls: CheckoutUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDisputeParams {
    pub opened_by: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveDisputeParams {
    pub resolution: String,
    /// The status the order moves to: `completed`, `refunded` or `cancelled`.
    pub outcome: OrderStatusType,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustBalanceParams {
    /// Signed amount in cents.
    pub amount: Money,
    pub reason: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawParams {
    /// Positive amount in cents.
    pub amount: Money,
    /// The payout system's reference. A second withdrawal with the same reference is rejected.
    pub payout_reference: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeQuoteParams {
    pub amount: Money,
}

/// Query string of a Mercado Pago notification. Webhooks carry `type` and `data.id`, while the older IPN
/// notifications carry `topic` and `id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub topic: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
    pub id: Option<String>,
}

impl WebhookQuery {
    /// Decodes a raw query string, percent-escapes included.
    pub fn from_query(query: &str) -> Result<Self, ServerError> {
        web::Query::<Self>::from_query(query)
            .map(web::Query::into_inner)
            .map_err(|e| ServerError::InvalidRequestPath(format!("Invalid webhook query string. {e}")))
    }

    /// The notification topic, from `type` or else `topic`.
    pub fn kind(&self) -> Option<&str> {
        non_empty(&self.kind).or_else(|| non_empty(&self.topic))
    }

    /// The notified resource id, from `data.id` or else `id`.
    pub fn resource_id(&self) -> Option<&str> {
        non_empty(&self.data_id).or_else(|| non_empty(&self.id))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
