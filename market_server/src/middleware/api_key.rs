//! Shared-key middleware for Actix Web.
//!
//! The marketplace backend calls this server with a pre-shared key in a request header. Service routes expect
//! `X-Api-Key`. Administrative routes expect `X-Admin-Key`. Wrap a scope with [`ApiKeyMiddlewareFactory`] to guard
//! every route in it.
//!
//! An empty configured key denies every request, so a missing environment variable never opens a scope up.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use market_common::Secret;

use crate::errors::ServerError;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

pub struct ApiKeyMiddlewareFactory {
    header: String,
    key: Secret<String>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(header: &str, key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { header: header.into(), key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService {
            header: self.header.clone(),
            key: self.key.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    header: String,
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorised = match req.headers().get(&self.header).and_then(|v| v.to_str().ok()) {
            Some(_) if self.key.is_empty() => {
                warn!("🔐️ No key is configured for {}. Denying access to {}.", self.header, req.path());
                false
            },
            Some(presented) => presented == self.key.reveal().as_str(),
            None => false,
        };
        let header = self.header.clone();
        Box::pin(async move {
            if authorised {
                trace!("🔐️ {header} check for {} ✅️", req.path());
                service.call(req).await
            } else {
                warn!("🔐️ Missing or invalid {header} for {}. Denying access.", req.path());
                Err(ServerError::Unauthorized(format!("A valid {header} header is required.")).into())
            }
        })
    }
}
