use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `data` keyed with `secret`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::default(),
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// The parts of a Mercado Pago `x-signature` header, e.g. `ts=1704908010,v1=618c8534...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSignature {
    pub ts: String,
    pub v1: String,
}

impl WebhookSignature {
    pub fn parse(header: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;
        for part in header.split(',') {
            match part.split_once('=').map(|(k, v)| (k.trim(), v.trim())) {
                Some(("ts", v)) if !v.is_empty() => ts = Some(v.to_string()),
                Some(("v1", v)) if !v.is_empty() => v1 = Some(v.to_string()),
                _ => trace!("🔐️ Ignoring unexpected signature component '{part}'"),
            }
        }
        Some(Self { ts: ts?, v1: v1? })
    }

    /// The string Mercado Pago signs: `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`. Components whose values are
    /// missing from the request are left out.
    pub fn manifest(&self, data_id: Option<&str>, request_id: Option<&str>) -> String {
        let mut manifest = String::new();
        if let Some(id) = data_id {
            // Alphanumeric ids are signed in lower case
            manifest.push_str(&format!("id:{};", id.to_ascii_lowercase()));
        }
        if let Some(request_id) = request_id {
            manifest.push_str(&format!("request-id:{request_id};"));
        }
        manifest.push_str(&format!("ts:{};", self.ts));
        manifest
    }

    /// Checks `v1` against the HMAC of the manifest. The tag comparison runs in constant time.
    pub fn verify(&self, secret: &str, data_id: Option<&str>, request_id: Option<&str>) -> bool {
        let Ok(tag) = hex::decode(&self.v1) else {
            trace!("🔐️ Signature v1 is not valid hex");
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(self.manifest(data_id, request_id).as_bytes());
        mac.verify_slice(&tag).is_ok()
    }
}
