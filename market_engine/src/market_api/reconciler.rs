//! # Payment webhook reconciliation
//!
//! Payment gateway notifications are at-least-once and unauthenticated as far as their content goes. The reconciler
//! therefore treats a notification as nothing more than a hint that payment `id` may have changed. It then:
//!
//! 1. Reads the payment back from the gateway (the only trusted source), within a bounded time.
//! 2. Uses the payment's purpose and `external_reference` to find the local record.
//! 3. Applies the payment's effect with a conditional write, so that duplicate and concurrent deliveries of the same
//!    notification apply exactly once.
//!
//! Every notification that has been fully dealt with produces a [`ReconciliationOutcome`]. Errors mean the gateway
//! should try again later (if [`MarketplaceError::is_retryable`]) or that the notification refers to something that
//! does not exist.
use std::{fmt::Debug, str::FromStr, time::Duration};

use log::*;
use serde_json::json;

use crate::{
    db_types::{CreditPurchaseStatus, Money, OrderId, OrderStatusType},
    events::CreditsPurchasedEvent,
    market_api::order_flow_api::OrderFlowApi,
    payment_objects::{PaymentNotification, ReconciliationOutcome},
    traits::{
        GatewayError,
        GatewayPayment,
        GatewayPaymentStatus,
        MarketplaceDatabase,
        MarketplaceError,
        PaymentGateway,
        PaymentPurpose,
    },
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const GATEWAY_ACTOR: &str = "payment_gateway";

pub struct PaymentReconciler<B, G> {
    flow: OrderFlowApi<B>,
    gateway: G,
    fetch_timeout: Duration,
}

impl<B, G> Debug for PaymentReconciler<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentReconciler (timeout {:?})", self.fetch_timeout)
    }
}

impl<B: Clone, G: Clone> Clone for PaymentReconciler<B, G> {
    fn clone(&self) -> Self {
        Self { flow: self.flow.clone(), gateway: self.gateway.clone(), fetch_timeout: self.fetch_timeout }
    }
}

impl<B, G> PaymentReconciler<B, G> {
    pub fn new(flow: OrderFlowApi<B>, gateway: G) -> Self {
        Self { flow, gateway, fetch_timeout: DEFAULT_FETCH_TIMEOUT }
    }

    pub fn with_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

impl<B, G> PaymentReconciler<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<ReconciliationOutcome, MarketplaceError> {
        if !notification.is_payment() {
            debug!("🔔️ Ignoring '{}' notification", notification.kind);
            return Ok(ReconciliationOutcome::ignored(format!("'{}' notifications are not handled", notification.kind)));
        }
        let payment_id = notification
            .payment_id()
            .ok_or_else(|| MarketplaceError::ValidationError("The notification carries no payment id".to_string()))?;
        if !payment_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MarketplaceError::ValidationError(format!("'{payment_id}' is not a valid payment id")));
        }
        let payment = self.fetch_payment(payment_id).await?;
        let (purpose, reference) = match (payment.purpose, payment.external_reference.as_deref()) {
            (Some(p), Some(r)) if !r.is_empty() => (p, r.to_string()),
            _ => {
                info!("🔔️ Payment {payment_id} does not refer to anything we track");
                return Ok(ReconciliationOutcome::ignored(format!("Payment {payment_id} has no usable reference")));
            },
        };
        debug!("🔔️ Payment {payment_id} is {:?} for {purpose} {reference}", payment.status);
        match purpose {
            PaymentPurpose::CreditPurchase => self.reconcile_credit_purchase(&payment, reference).await,
            PaymentPurpose::OrderPayment => self.reconcile_order_payment(&payment, reference).await,
        }
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, MarketplaceError> {
        match tokio::time::timeout(self.fetch_timeout, self.gateway.fetch_payment(payment_id)).await {
            Ok(Ok(payment)) => Ok(payment),
            Ok(Err(e)) => {
                warn!("🔔️ Could not fetch payment {payment_id}. {e}");
                Err(e.into())
            },
            Err(_) => {
                warn!("🔔️ Fetching payment {payment_id} timed out after {:?}", self.fetch_timeout);
                Err(GatewayError::Timeout.into())
            },
        }
    }

    async fn reconcile_credit_purchase(
        &self,
        payment: &GatewayPayment,
        reference: String,
    ) -> Result<ReconciliationOutcome, MarketplaceError> {
        let purpose = PaymentPurpose::CreditPurchase;
        let purchase_id = i64::from_str(&reference).map_err(|_| MarketplaceError::ReferenceNotFound(reference.clone()))?;
        let db = self.flow.db();
        let purchase = db
            .fetch_credit_purchase(purchase_id)
            .await?
            .ok_or_else(|| MarketplaceError::ReferenceNotFound(reference.clone()))?;
        if purchase.status != CreditPurchaseStatus::Pending {
            debug!("🔔️ Credit purchase {purchase_id} is already {}", purchase.status);
            return Ok(ReconciliationOutcome::AlreadyApplied { purpose, reference });
        }
        match &payment.status {
            GatewayPaymentStatus::Approved => {
                check_amount(purchase.price, payment.amount)?;
                match db.complete_credit_purchase(purchase_id, &payment.id).await? {
                    Some((purchase, entries)) => {
                        info!(
                            "🔔️ Credit purchase {purchase_id} paid by {}. {} ledger entries posted",
                            purchase.user_id,
                            entries.len()
                        );
                        self.flow.producers().publish_credits_purchased(CreditsPurchasedEvent::new(purchase)).await;
                        Ok(ReconciliationOutcome::Applied { purpose, reference, status: "approved".into() })
                    },
                    None => Ok(ReconciliationOutcome::AlreadyApplied { purpose, reference }),
                }
            },
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => {
                let status = gateway_status_name(&payment.status);
                match db.fail_credit_purchase(purchase_id, &payment.id).await? {
                    Some(_) => {
                        info!("🔔️ Credit purchase {purchase_id} failed. The payment was {status}");
                        Ok(ReconciliationOutcome::Applied { purpose, reference, status })
                    },
                    None => Ok(ReconciliationOutcome::AlreadyApplied { purpose, reference }),
                }
            },
            GatewayPaymentStatus::InProgress(s) => {
                Ok(ReconciliationOutcome::Pending { purpose, reference, status: s.clone() })
            },
        }
    }

    async fn reconcile_order_payment(
        &self,
        payment: &GatewayPayment,
        reference: String,
    ) -> Result<ReconciliationOutcome, MarketplaceError> {
        let purpose = PaymentPurpose::OrderPayment;
        let order_id = OrderId::from_str(&reference).map_err(|_| MarketplaceError::ReferenceNotFound(reference.clone()))?;
        let order = self
            .flow
            .db()
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| MarketplaceError::ReferenceNotFound(reference.clone()))?;
        if !order.status.is_awaiting_payment() {
            debug!("🔔️ Order {order_id} is {} and no longer awaiting payment", order.status);
            return Ok(ReconciliationOutcome::AlreadyApplied { purpose, reference });
        }
        let target = match &payment.status {
            GatewayPaymentStatus::Approved => {
                check_amount(order.total_amount, payment.amount)?;
                OrderStatusType::Paid
            },
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => OrderStatusType::Failed,
            GatewayPaymentStatus::InProgress(s) => {
                return Ok(ReconciliationOutcome::Pending { purpose, reference, status: s.clone() });
            },
        };
        let status = gateway_status_name(&payment.status);
        let change = self
            .flow
            .prepare_change(&order, target, GATEWAY_ACTOR, None)?
            .with_payment_id(payment.id.clone())
            .with_payload(json!({ "payment_id": payment.id, "payment_status": status }));
        match self.flow.commit_change(change).await {
            Ok(order) => {
                info!("🔔️ Order {order_id} is now {} after payment {} was {status}", order.status, payment.id);
                Ok(ReconciliationOutcome::Applied { purpose, reference, status })
            },
            Err(MarketplaceError::TransitionConflict(..)) => {
                debug!("🔔️ Order {order_id} was settled by a concurrent delivery of payment {}", payment.id);
                Ok(ReconciliationOutcome::AlreadyApplied { purpose, reference })
            },
            Err(e) => Err(e),
        }
    }
}

/// An approved payment is only applied when the gateway reports exactly the expected amount.
fn check_amount(expected: Money, paid: Option<Money>) -> Result<(), MarketplaceError> {
    match paid {
        Some(paid) if paid == expected => Ok(()),
        Some(paid) => {
            error!("🔔️ Payment amount {paid} does not match the expected {expected}");
            Err(MarketplaceError::PaymentAmountMismatch { expected, paid })
        },
        None => {
            warn!("🔔️ The gateway reported an approved payment without an amount. Expected {expected}");
            Err(GatewayError::InvalidResponse("The approved payment has no transaction amount".to_string()).into())
        },
    }
}

fn gateway_status_name(status: &GatewayPaymentStatus) -> String {
    match status {
        GatewayPaymentStatus::Approved => "approved".to_string(),
        GatewayPaymentStatus::Rejected => "rejected".to_string(),
        GatewayPaymentStatus::Cancelled => "cancelled".to_string(),
        GatewayPaymentStatus::InProgress(s) => s.clone(),
    }
}
