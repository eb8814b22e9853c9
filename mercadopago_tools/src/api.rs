use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MercadoPagoConfig,
    data_objects::{NewPreference, Payment, Preference},
    MercadoPagoApiError,
};

#[derive(Clone)]
pub struct MercadoPagoApi {
    config: MercadoPagoConfig,
    client: Arc<Client>,
}

impl MercadoPagoApi {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, MercadoPagoApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.access_token.reveal());
        let mut val =
            HeaderValue::from_str(&bearer).map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &MercadoPagoConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, MercadoPagoApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                MercadoPagoApiError::Timeout
            } else {
                MercadoPagoApiError::RestRequestError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MercadoPagoApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message =
                response.text().await.map_err(|e| MercadoPagoApiError::RestRequestError(e.to_string()))?;
            Err(MercadoPagoApiError::QueryError { status, message })
        }
    }

    /// Creates a checkout preference. The returned `init_point` is the URL the payer must be sent to.
    pub async fn create_preference(&self, preference: &NewPreference) -> Result<Preference, MercadoPagoApiError> {
        debug!("💳️ Creating checkout preference for reference {}", preference.external_reference);
        let result =
            self.rest_query::<Preference, &NewPreference>(Method::POST, "/checkout/preferences", Some(preference)).await?;
        info!("💳️ Created preference {} for reference {}", result.id, preference.external_reference);
        Ok(result)
    }

    /// Fetches the authoritative state of a payment.
    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment, MercadoPagoApiError> {
        let path = format!("/v1/payments/{payment_id}");
        debug!("💳️ Fetching payment {payment_id}");
        let result = self.rest_query::<Payment, ()>(Method::GET, &path, None).await?;
        debug!("💳️ Payment {payment_id} is {}", result.status);
        Ok(result)
    }
}
