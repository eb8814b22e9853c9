//! The production [`PaymentGateway`]: checkout preferences and payment reads against the Mercado Pago REST API.
use log::*;
use market_common::Money;
use market_engine::traits::{
    CheckoutRequest,
    CheckoutSession,
    GatewayError,
    GatewayPayment,
    GatewayPaymentStatus,
    PaymentGateway,
    PaymentPurpose,
};
use mercadopago_tools::{
    BackUrls,
    MercadoPagoApi,
    MercadoPagoApiError,
    MercadoPagoConfig,
    NewPreference,
    Payer,
    Payment,
    PaymentStatus,
    PreferenceItem,
};
use serde_json::json;

use crate::errors::ServerError;

#[derive(Clone)]
pub struct MercadoPagoGateway {
    api: MercadoPagoApi,
}

impl MercadoPagoGateway {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, ServerError> {
        let api = MercadoPagoApi::new(config)?;
        Ok(Self { api })
    }

    fn new_preference(&self, request: CheckoutRequest) -> NewPreference {
        let urls = request.urls;
        let auto_return = urls.success.as_ref().map(|_| "approved".to_string());
        NewPreference {
            items: vec![PreferenceItem {
                id: Some(request.external_reference.clone()),
                title: request.title,
                quantity: 1,
                currency_id: self.api.config().currency_id.clone(),
                unit_price: request.amount.to_decimal(),
            }],
            payer: request.payer_email.map(|email| Payer { email }),
            back_urls: BackUrls {
                success: urls.success.unwrap_or_default(),
                failure: urls.failure.unwrap_or_default(),
                pending: urls.pending.unwrap_or_default(),
            },
            auto_return,
            notification_url: urls.notification,
            external_reference: request.external_reference,
            metadata: json!({ "type": request.purpose.as_str() }),
        }
    }
}

impl PaymentGateway for MercadoPagoGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let preference = self.new_preference(request);
        let result = self.api.create_preference(&preference).await.map_err(gateway_error)?;
        Ok(CheckoutSession { preference_id: result.id, checkout_url: result.init_point })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let payment = self.api.get_payment(payment_id).await.map_err(gateway_error)?;
        Ok(gateway_payment(payment))
    }
}

fn gateway_payment(payment: Payment) -> GatewayPayment {
    let purpose = match payment.metadata_type() {
        Some("credit_purchase") => Some(PaymentPurpose::CreditPurchase),
        Some("order_payment") => Some(PaymentPurpose::OrderPayment),
        other => {
            debug!("💳️ Payment {} carries an unrecognised metadata type: {other:?}", payment.id);
            None
        },
    };
    let status = match payment.status {
        PaymentStatus::Approved => GatewayPaymentStatus::Approved,
        PaymentStatus::Rejected => GatewayPaymentStatus::Rejected,
        PaymentStatus::Cancelled => GatewayPaymentStatus::Cancelled,
        other => GatewayPaymentStatus::InProgress(other.to_string()),
    };
    let amount = payment.transaction_amount.and_then(|a| {
        Money::try_from(a).map_err(|e| warn!("💳️ Payment {} has an unusable amount. {e}", payment.id)).ok()
    });
    GatewayPayment {
        id: payment.id.to_string(),
        status,
        purpose,
        external_reference: payment.external_reference.filter(|r| !r.is_empty()),
        amount,
    }
}

fn gateway_error(e: MercadoPagoApiError) -> GatewayError {
    warn!("💳️ Mercado Pago call failed. {e}");
    match e {
        MercadoPagoApiError::Timeout => GatewayError::Timeout,
        MercadoPagoApiError::JsonError(s) => GatewayError::InvalidResponse(s),
        e if e.is_transient() => GatewayError::Unavailable(e.to_string()),
        e => GatewayError::Rejected(e.to_string()),
    }
}
