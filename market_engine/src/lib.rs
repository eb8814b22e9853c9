//! Marketplace Engine
//!
//! This library holds the money-moving core of the marketplace: the order status machine, the tiered fee
//! calculator, the wallet ledger and the payment webhook reconciler. It is storage- and gateway-agnostic.
//!
//! The library is divided into these sections:
//! 1. Storage contracts ([`mod@traits`]) and the SQLite backend that implements them. You should never need to access
//!    the database directly. Instead, use the public API. The exception is the data types used in the database.
//!    These are defined in the [`mod@db_types`] module and are public.
//! 2. The pure fee calculator ([`mod@fees`]).
//! 3. The public API ([`mod@market_api`]). This is where status transitions are validated, fee splits are decided and
//!    gateway notifications are reconciled. Backends need to implement the traits in [`mod@traits`] to be used here.
//!
//! The engine also emits events when orders are created, change status, or when wallet credits are purchased.
//! A simple actor framework ([`mod@events`]) lets you hook into these and perform custom actions.
pub mod db_types;
pub mod events;
pub mod fees;
pub mod market_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use market_api::{
    checkout_api::CheckoutApi,
    conversation_api::ConversationApi,
    fee_api::FeeApi,
    order_flow_api::{OrderFlowApi, OrderFlowConfig},
    order_objects,
    payment_objects,
    reconciler::PaymentReconciler,
    wallet_api::WalletApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    ConversationManagement,
    CreditPurchaseManagement,
    ErrorKind,
    FeeTierManagement,
    GatewayError,
    MarketplaceDatabase,
    MarketplaceError,
    OrderManagement,
    PaymentGateway,
    WalletManagement,
};
