mod api_key;
mod signature;

pub use api_key::{ApiKeyMiddlewareFactory, ApiKeyMiddlewareService, ADMIN_KEY_HEADER, API_KEY_HEADER};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService, REQUEST_ID_HEADER, SIGNATURE_HEADER};
