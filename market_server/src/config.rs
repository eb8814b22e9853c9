use std::env;

use log::*;
use market_common::{parse_boolean_flag, Money, Secret};
use market_engine::{
    fees::FeeConfig,
    market_api::order_flow_api::DEFAULT_PLATFORM_USER_ID,
    traits::CheckoutUrls,
    OrderFlowConfig,
};
use mercadopago_tools::MercadoPagoConfig;
use rust_decimal::Decimal;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8380;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
pub const WEBHOOK_PATH: &str = "/webhooks/mercadopago";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Key that callers of the `/api` routes must present in the `X-Api-Key` header.
    pub api_key: Secret<String>,
    /// Key that callers of the `/api/admin` routes must present in the `X-Admin-Key` header.
    pub admin_api_key: Secret<String>,
    /// The wallet owner that platform fees are credited to.
    pub platform_user_id: String,
    /// Externally reachable base URL of this server, if known. The webhook notification URL is derived from it.
    pub public_url: Option<String>,
    pub fee_config: FeeConfig,
    pub mercadopago: MercadoPagoSettings,
}

#[derive(Clone, Debug, Default)]
pub struct MercadoPagoSettings {
    pub api: MercadoPagoConfig,
    pub webhook_secret: Secret<String>,
    /// If false, webhook signatures are not checked at all. **DANGER**
    pub signature_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            api_key: Secret::default(),
            admin_api_key: Secret::default(),
            platform_user_id: DEFAULT_PLATFORM_USER_ID.to_string(),
            public_url: None,
            fee_config: FeeConfig::default(),
            mercadopago: MercadoPagoSettings { signature_checks: true, ..Default::default() },
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let max_connections = env::var("MKT_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid value for MKT_DATABASE_MAX_CONNECTIONS ({s}). {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let api_key = required_secret("MKT_API_KEY");
        let admin_api_key = required_secret("MKT_ADMIN_API_KEY");
        let platform_user_id = env::var("MKT_PLATFORM_USER_ID").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(
            || {
                info!("🪛️ MKT_PLATFORM_USER_ID is not set. Platform fees will be credited to '{DEFAULT_PLATFORM_USER_ID}'.");
                DEFAULT_PLATFORM_USER_ID.to_string()
            },
        );
        let public_url = env::var("MKT_PUBLIC_URL").ok().map(|s| s.trim_end_matches('/').to_string());
        if public_url.is_none() {
            warn!(
                "🪛️ MKT_PUBLIC_URL is not set. Checkouts will not carry a notification URL, so webhooks must be \
                 configured in the Mercado Pago dashboard."
            );
        }
        let fee_config = fee_config_from_env();
        let mercadopago = MercadoPagoSettings::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            max_connections,
            api_key,
            admin_api_key,
            platform_user_id,
            public_url,
            fee_config,
            mercadopago,
        }
    }

    pub fn order_flow_config(&self) -> OrderFlowConfig {
        OrderFlowConfig { fee_config: self.fee_config.clone(), platform_user_id: self.platform_user_id.clone() }
    }

    /// The URLs every checkout gets unless the caller overrides them.
    pub fn default_checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls {
            notification: self.public_url.as_ref().map(|base| format!("{base}{WEBHOOK_PATH}")),
            ..Default::default()
        }
    }
}

impl MercadoPagoSettings {
    pub fn from_env_or_default() -> Self {
        let api = MercadoPagoConfig::new_from_env_or_default();
        let webhook_secret = Secret::new(env::var("MKT_MP_WEBHOOK_SECRET").ok().unwrap_or_default());
        let signature_checks = parse_boolean_flag(env::var("MKT_MP_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Anyone can send payment notifications to this server.");
        } else if webhook_secret.is_empty() {
            error!(
                "🪛️ MKT_MP_WEBHOOK_SECRET is not set, but signature checks are enabled. Every webhook will be rejected."
            );
        }
        Self { api, webhook_secret, signature_checks }
    }
}

fn required_secret(name: &str) -> Secret<String> {
    let value = env::var(name).ok().unwrap_or_else(|| {
        error!("🪛️ {name} is not set. Every request to the routes it guards will be rejected.");
        String::default()
    });
    Secret::new(value)
}

fn fee_config_from_env() -> FeeConfig {
    let defaults = FeeConfig::default();
    let fallback_percentage = decimal_from_env("MKT_FEE_FALLBACK_PERCENTAGE").unwrap_or(defaults.fallback_percentage);
    let processor_percentage =
        decimal_from_env("MKT_FEE_PROCESSOR_PERCENTAGE").unwrap_or(defaults.processor_percentage);
    let minimum_fee = decimal_from_env("MKT_FEE_MINIMUM")
        .and_then(|d| Money::try_from(d).map_err(|e| error!("🪛️ Invalid value for MKT_FEE_MINIMUM. {e}")).ok())
        .unwrap_or(defaults.minimum_fee);
    let config = FeeConfig { fallback_percentage, minimum_fee, processor_percentage };
    info!(
        "🪛️ Fees: fallback {}%, minimum {}, processor share {}%",
        config.fallback_percentage, config.minimum_fee, config.processor_percentage
    );
    config
}

fn decimal_from_env(name: &str) -> Option<Decimal> {
    let value = env::var(name).ok()?;
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| error!("🪛️ {value} is not a valid number for {name}. {e} Using the default instead."))
        .ok()
        .filter(|d| {
            let ok = !d.is_sign_negative();
            if !ok {
                error!("🪛️ {name} cannot be negative. Using the default instead.");
            }
            ok
        })
}
