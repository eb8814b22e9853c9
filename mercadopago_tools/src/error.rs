use thiserror::Error;

#[derive(Debug, Error)]
pub enum MercadoPagoApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request to Mercado Pago failed: {0}")]
    RestRequestError(String),
    #[error("Request to Mercado Pago timed out")]
    Timeout,
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl MercadoPagoApiError {
    /// True if a later retry of the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RestRequestError(_) | Self::Timeout => true,
            Self::QueryError { status, .. } => *status == 429 || *status >= 500,
            Self::Initialization(_) | Self::JsonError(_) => false,
        }
    }
}
