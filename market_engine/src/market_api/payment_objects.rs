use std::fmt::Display;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::{
    db_types::{CreditPurchase, Order},
    traits::{CheckoutSession, PaymentPurpose},
};

/// The body of a payment gateway notification.
///
/// Only the topic and the payment id are used. Everything else in the notification is untrusted, and the real state is
/// read back from the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    #[serde(rename = "type", alias = "topic", default)]
    pub kind: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl PaymentNotification {
    pub fn payment<S: Into<String>>(payment_id: S) -> Self {
        Self {
            kind: "payment".to_string(),
            action: Some("payment.updated".to_string()),
            data: Some(NotificationData { id: payment_id.into() }),
        }
    }

    pub fn is_payment(&self) -> bool {
        self.kind.eq_ignore_ascii_case("payment")
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.id.as_str()).filter(|id| !id.is_empty())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        S(String),
        N(u64),
    }
    match StringOrNumber::deserialize(deserializer) {
        Ok(StringOrNumber::S(s)) => Ok(s),
        Ok(StringOrNumber::N(n)) => Ok(n.to_string()),
        Err(_) => Err(de::Error::custom("expected a string or an unsigned integer id")),
    }
}

/// What the reconciler did with a notification. All of these are successful outcomes, and the gateway should not
/// redeliver the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// The notification is not about anything we track.
    Ignored { reason: String },
    /// The payment's effect has been applied.
    Applied { purpose: PaymentPurpose, reference: String, status: String },
    /// The local record had already reached its final state. Nothing was changed.
    AlreadyApplied { purpose: PaymentPurpose, reference: String },
    /// The payment has not settled yet. Nothing was changed.
    Pending { purpose: PaymentPurpose, reference: String, status: String },
}

impl ReconciliationOutcome {
    pub fn ignored<S: Into<String>>(reason: S) -> Self {
        Self::Ignored { reason: reason.into() }
    }
}

impl Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignored { reason } => write!(f, "Ignored. {reason}"),
            Self::Applied { purpose, reference, status } => write!(f, "Applied {status} to {purpose} {reference}"),
            Self::AlreadyApplied { purpose, reference } => write!(f, "{purpose} {reference} was already settled"),
            Self::Pending { purpose, reference, status } => {
                write!(f, "{purpose} {reference} is still pending ({status})")
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCheckout {
    pub order: Order,
    pub checkout: CheckoutSession,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCheckout {
    pub purchase: CreditPurchase,
    pub checkout: CheckoutSession,
}
