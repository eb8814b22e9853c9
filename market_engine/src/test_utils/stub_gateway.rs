use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use crate::{
    db_types::Money,
    traits::{
        CheckoutRequest,
        CheckoutSession,
        GatewayError,
        GatewayPayment,
        GatewayPaymentStatus,
        PaymentGateway,
        PaymentPurpose,
    },
};

/// An in-memory payment gateway. Tests script the payments it knows about and inspect the checkouts it was asked for.
#[derive(Debug, Clone, Default)]
pub struct StubGateway {
    payments: Arc<Mutex<HashMap<String, GatewayPayment>>>,
    checkouts: Arc<Mutex<Vec<CheckoutRequest>>>,
    fetches: Arc<AtomicU64>,
    delay: Option<Duration>,
    outage: Option<GatewayError>,
}

impl StubGateway {
    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call fails with `error`.
    pub fn with_outage(mut self, error: GatewayError) -> Self {
        self.outage = Some(error);
        self
    }

    pub fn add_payment(&self, payment: GatewayPayment) {
        self.payments.lock().unwrap().insert(payment.id.clone(), payment);
    }

    pub fn add_order_payment(&self, id: &str, order_id: i64, status: GatewayPaymentStatus, amount: Money) {
        self.add_payment(GatewayPayment {
            id: id.to_string(),
            status,
            purpose: Some(PaymentPurpose::OrderPayment),
            external_reference: Some(order_id.to_string()),
            amount: Some(amount),
        });
    }

    pub fn add_credit_payment(&self, id: &str, purchase_id: i64, status: GatewayPaymentStatus, amount: Money) {
        self.add_payment(GatewayPayment {
            id: id.to_string(),
            status,
            purpose: Some(PaymentPurpose::CreditPurchase),
            external_reference: Some(purchase_id.to_string()),
            amount: Some(amount),
        });
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) -> Result<(), GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outage {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl PaymentGateway for StubGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        self.simulate_latency().await?;
        let mut checkouts = self.checkouts.lock().unwrap();
        let preference_id = format!("pref-{}-{}", request.purpose, checkouts.len() + 1);
        let checkout_url = format!("https://checkout.example/{preference_id}");
        checkouts.push(request);
        Ok(CheckoutSession { preference_id, checkout_url })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("Payment {payment_id} not found")))
    }
}
