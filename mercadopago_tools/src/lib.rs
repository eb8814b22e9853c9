//! A small, typed client for the parts of the Mercado Pago REST API the marketplace uses:
//!
//! * `POST /checkout/preferences` creates a payable checkout preference ([`MercadoPagoApi::create_preference`]).
//! * `GET /v1/payments/{id}` fetches the authoritative state of a payment ([`MercadoPagoApi::get_payment`]).
//!
//! Webhook notifications only carry a payment id. Never trust anything else in them; always read the payment back
//! through this client.
mod api;
mod config;
mod error;

pub mod data_objects;

pub use api::MercadoPagoApi;
pub use config::MercadoPagoConfig;
pub use data_objects::{BackUrls, NewPreference, Payer, Payment, PaymentStatus, Preference, PreferenceItem};
pub use error::MercadoPagoApiError;
