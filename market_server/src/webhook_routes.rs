//! Payment gateway webhooks.
//!
//! Mercado Pago retries a notification until it gets a `2xx`. The response code therefore tells it whether to come
//! back later:
//! * Every reconciliation outcome, including "ignored" and "already applied", is a `200`.
//! * An unknown payment reference is a `404`. A transient failure of the store or the gateway is a `503`, which makes
//!   Mercado Pago redeliver.
use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use market_engine::{
    payment_objects::{NotificationData, PaymentNotification},
    traits::{MarketplaceDatabase, PaymentGateway},
    PaymentReconciler,
};

use crate::{
    data_objects::{JsonResponse, WebhookQuery},
    errors::ServerError,
    route,
};

route!(mercadopago_webhook => Post "/mercadopago" impl MarketplaceDatabase, PaymentGateway);
pub async fn mercadopago_webhook<B: MarketplaceDatabase, G: PaymentGateway>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentReconciler<B, G>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🔔️ Received Mercado Pago webhook");
    let notification = parse_notification(req.query_string(), body.as_ref())?;
    debug!("🔔️ Notification '{}' for {:?}", notification.kind, notification.payment_id());
    match api.handle_notification(notification).await {
        Ok(outcome) => {
            info!("🔔️ {outcome}");
            Ok(HttpResponse::Ok().json(JsonResponse::success(outcome)))
        },
        Err(e) if e.is_retryable() => {
            warn!("🔔️ Could not reconcile the notification now. The gateway will retry. {e}");
            Err(e.into())
        },
        Err(e) => {
            warn!("🔔️ Notification could not be reconciled. {e}");
            Err(e.into())
        },
    }
}

/// Notifications normally carry a JSON body. Older (IPN style) notifications carry `topic` and `id` in the query
/// string and have an empty body.
fn parse_notification(query: &str, body: &[u8]) -> Result<PaymentNotification, ServerError> {
    if !body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice::<PaymentNotification>(body).map_err(|e| {
            warn!("🔔️ Could not deserialize webhook body. {e}");
            ServerError::InvalidRequestBody(e.to_string())
        });
    }
    let query = WebhookQuery::from_query(query)?;
    let kind = query.kind().unwrap_or_default().to_string();
    let data = query.resource_id().map(|id| NotificationData { id: id.to_string() });
    Ok(PaymentNotification { kind, action: None, data })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn notifications_from_body_or_query() {
        let n = parse_notification("data.id=5&type=payment", br#"{"type":"payment","data":{"id":"5"}}"#).unwrap();
        assert!(n.is_payment());
        assert_eq!(n.payment_id(), Some("5"));
        let n = parse_notification("topic=payment&id=6", b"").unwrap();
        assert!(n.is_payment());
        assert_eq!(n.payment_id(), Some("6"));
        let n = parse_notification("topic=merchant_order&id=7", b"  ").unwrap();
        assert!(!n.is_payment());
        assert!(parse_notification("", b"{not json").is_err());
    }

    #[test]
    fn query_notifications_are_percent_decoded() {
        let n = parse_notification("topic=pay%6Dent&id=6", b"").unwrap();
        assert!(n.is_payment());
        assert_eq!(n.payment_id(), Some("6"));
        let n = parse_notification("type=payment&data.id=12%33", b"").unwrap();
        assert!(n.is_payment());
        assert_eq!(n.payment_id(), Some("123"));
        assert!(parse_notification("id=1&id=2", b"").is_err());
    }
}
