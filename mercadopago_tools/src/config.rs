use std::time::Duration;

use log::*;
use market_common::Secret;

const DEFAULT_API_URL: &str = "https://api.mercadopago.com";
const DEFAULT_CURRENCY: &str = "ARS";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    /// Base URL for the REST API. Override it to point at a sandbox or a local mock.
    pub api_url: String,
    pub access_token: Secret<String>,
    /// ISO currency code used for checkout line items
    pub currency_id: String,
    /// Upper bound on any single request to the API
    pub timeout: Duration,
}

impl Default for MercadoPagoConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: Secret::default(),
            currency_id: DEFAULT_CURRENCY.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl MercadoPagoConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MKT_MP_API_URL").unwrap_or_else(|_| {
            info!("🪛️ MKT_MP_API_URL not set, using {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });
        let access_token = Secret::new(std::env::var("MKT_MP_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ MKT_MP_ACCESS_TOKEN not set. Calls to Mercado Pago will be rejected.");
            String::default()
        }));
        let currency_id = std::env::var("MKT_MP_CURRENCY").unwrap_or_else(|_| {
            info!("🪛️ MKT_MP_CURRENCY not set, using {DEFAULT_CURRENCY}");
            DEFAULT_CURRENCY.to_string()
        });
        let timeout = std::env::var("MKT_MP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid value for MKT_MP_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { api_url, access_token, currency_id, timeout }
    }
}
