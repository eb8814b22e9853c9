//! # Marketplace server
//! This crate hosts the HTTP front end of the marketplace payment engine. It is responsible for:
//! * Accepting order, checkout, wallet and fee requests from the marketplace backend and handing them to the engine.
//! * Receiving Mercado Pago webhook notifications and passing them to the payment reconciler.
//! * Wiring the engine to the real payment gateway ([`integrations::mercadopago::MercadoPagoGateway`]).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/mercadopago`: Payment notifications from Mercado Pago.
//! * `/api/...`: Service routes, guarded by the `X-Api-Key` header.
//! * `/api/admin/...`: Administrative routes, guarded by the `X-Admin-Key` header.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
