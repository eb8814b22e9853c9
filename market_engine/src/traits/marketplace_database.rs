use thiserror::Error;

use crate::{
    db_types::{ConversionError, Money, OrderId, OrderStatusType},
    fees::FeeError,
    traits::{
        ConversationManagement,
        CreditPurchaseManagement,
        FeeTierManagement,
        GatewayError,
        OrderManagement,
        WalletManagement,
    },
};

/// This trait defines the full set of storage behaviour the marketplace engine needs from a backend.
///
/// It is a convenience bundle of the individual storage traits, so that the APIs can carry a single type parameter.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone + OrderManagement + WalletManagement + CreditPurchaseManagement + FeeTierManagement + ConversationManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

/// The broad classes of failure. The server maps these onto HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something that can never succeed.
    Validation,
    NotFound,
    /// The request was valid, but lost a race or arrived in the wrong state.
    Conflict,
    /// The store or the payment gateway failed. Retrying may help.
    Upstream,
    /// Stored data contradicts itself.
    InternalInconsistency,
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid status. {0}")]
    InvalidStatus(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} is already {1} and cannot change status")]
    OrderAlreadyTerminal(OrderId, OrderStatusType),
    #[error("An order cannot move from {from} to {to}")]
    TransitionForbidden { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} is already {1}. The requested change would result in a no-op.")]
    TransitionNoOp(OrderId, OrderStatusType),
    #[error("Order {0} was not in the expected status {1}. Another update got there first.")]
    TransitionConflict(OrderId, OrderStatusType),
    #[error("The requested dispute {0} does not exist")]
    DisputeNotFound(i64),
    #[error("Dispute {0} has already been resolved")]
    DisputeAlreadyResolved(i64),
    #[error("No wallet exists for {0}")]
    WalletNotFound(String),
    #[error("Wallet {wallet_id} has insufficient funds for a debit of {amount}")]
    InsufficientFunds { wallet_id: i64, amount: Money },
    #[error("Invalid ledger entry. {0}")]
    InvalidLedgerEntry(String),
    #[error("This entry has already been recorded. {0}")]
    DuplicateEntry(String),
    #[error("Ledger inconsistency detected. {0}")]
    LedgerInconsistency(String),
    #[error("The requested credit purchase {0} does not exist")]
    CreditPurchaseNotFound(i64),
    #[error("The requested credit package {0} does not exist or is not for sale")]
    CreditPackageNotFound(i64),
    #[error("The requested fee tier {0} does not exist")]
    FeeTierNotFound(i64),
    #[error("The requested conversation {0} does not exist")]
    ConversationNotFound(String),
    #[error("No local record matches the payment reference {0}")]
    ReferenceNotFound(String),
    #[error("Payment gateway error. {0}")]
    GatewayError(#[from] GatewayError),
    #[error("The payment amount {paid} does not match the expected amount {expected}")]
    PaymentAmountMismatch { expected: Money, paid: Money },
    #[error("{0}")]
    FeeError(#[from] FeeError),
}

impl MarketplaceError {
    pub fn kind(&self) -> ErrorKind {
        use MarketplaceError::*;
        match self {
            InvalidStatus(_) | ValidationError(_) | TransitionForbidden { .. } | InvalidLedgerEntry(_) | FeeError(_) => {
                ErrorKind::Validation
            },
            OrderNotFound(_)
            | DisputeNotFound(_)
            | WalletNotFound(_)
            | CreditPurchaseNotFound(_)
            | CreditPackageNotFound(_)
            | FeeTierNotFound(_)
            | ConversationNotFound(_)
            | ReferenceNotFound(_) => ErrorKind::NotFound,
            OrderAlreadyTerminal(..)
            | TransitionNoOp(..)
            | TransitionConflict(..)
            | DisputeAlreadyResolved(_)
            | InsufficientFunds { .. }
            | DuplicateEntry(_) => ErrorKind::Conflict,
            DatabaseError(_) | GatewayError(_) => ErrorKind::Upstream,
            LedgerInconsistency(_) | PaymentAmountMismatch { .. } => ErrorKind::InternalInconsistency,
        }
    }

    /// Whether the same request might succeed if it is simply tried again later.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Upstream
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(dbe) if dbe.is_unique_violation() => Self::DuplicateEntry(dbe.message().to_string()),
            _ => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<ConversionError> for MarketplaceError {
    fn from(e: ConversionError) -> Self {
        Self::InvalidStatus(e.0)
    }
}
