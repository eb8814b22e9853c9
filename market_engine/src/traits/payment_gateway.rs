use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Money;

/// What a gateway payment is paying for. It travels to the gateway as the `type` metadata field and comes back with
/// the payment, so that the reconciler knows which table the `external_reference` points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    CreditPurchase,
    OrderPayment,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditPurchase => "credit_purchase",
            Self::OrderPayment => "order_payment",
        }
    }
}

impl Display for PaymentPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutUrls {
    pub success: Option<String>,
    pub failure: Option<String>,
    pub pending: Option<String>,
    /// Where the gateway should send payment notifications.
    pub notification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub purpose: PaymentPurpose,
    pub external_reference: String,
    pub title: String,
    pub amount: Money,
    pub payer_email: Option<String>,
    pub urls: CheckoutUrls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub preference_id: String,
    /// The URL the payer must be redirected to.
    pub checkout_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    Cancelled,
    /// Any other state. The payment may still settle either way.
    InProgress(String),
}

/// The authoritative state of a payment, as read back from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: GatewayPaymentStatus,
    /// `None` if the metadata type is missing or unrecognised.
    pub purpose: Option<PaymentPurpose>,
    pub external_reference: Option<String>,
    pub amount: Option<Money>,
}

/// Gateway failures. They are all considered transient: the notification will be redelivered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("The payment gateway is unavailable. {0}")]
    Unavailable(String),
    #[error("The payment gateway did not respond in time")]
    Timeout,
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
    #[error("The payment gateway sent a response we could not understand. {0}")]
    InvalidResponse(String),
}

/// The external payment provider.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a hosted checkout for the given amount.
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;

    /// Performs an authenticated read of a payment. Notifications are never trusted on their own. This is the only
    /// source of truth for payment state.
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}
