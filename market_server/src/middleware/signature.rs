//! Webhook signature middleware for Actix Web.
//!
//! Mercado Pago signs each notification with the webhook secret configured in its dashboard. The signature arrives in
//! the `x-signature` header as `ts=<unix time>,v1=<hex hmac>`, and covers the manifest
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`. See [`WebhookSignature`].
//!
//! `data.id` is taken from the percent-decoded query string, which is where Mercado Pago puts it. If it is absent there, the `data.id`
//! field of the JSON body is used.
//!
//! A valid signature only proves the notification came from Mercado Pago. Its contents are still never trusted: the
//! reconciler reads the payment back from the API.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use market_common::Secret;
use market_engine::payment_objects::PaymentNotification;

use crate::{data_objects::WebhookQuery, errors::ServerError, helpers::WebhookSignature};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct SignatureMiddlewareFactory {
    secret: Secret<String>,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl SignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, enabled: bool) -> Self {
        SignatureMiddlewareFactory { secret, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            secret: self.secret.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    secret: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let signature = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(WebhookSignature::parse)
                .ok_or_else(|| {
                    warn!("🔐️ No usable {SIGNATURE_HEADER} header found in webhook. Denying access.");
                    ServerError::InvalidSignature(format!("A valid {SIGNATURE_HEADER} header is required."))
                })?;
            let request_id = req.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()).map(String::from);
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let query = WebhookQuery::from_query(req.query_string()).unwrap_or_else(|e| {
                warn!("🔐️ {e}");
                WebhookQuery::default()
            });
            let data_id = query.resource_id().map(String::from).or_else(|| {
                serde_json::from_slice::<PaymentNotification>(data.as_ref())
                    .ok()
                    .and_then(|n| n.payment_id().map(String::from))
            });
            if !secret.is_empty() && signature.verify(&secret, data_id.as_deref(), request_id.as_deref()) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid webhook signature for data.id {data_id:?}. Denying access.");
                Err(ServerError::InvalidSignature("The signature does not match.".into()).into())
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
