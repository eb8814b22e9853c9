//! #  Storage and gateway contracts.
//!
//! This module defines the interface contracts that marketplace *backends* must satisfy.
//!
//! ## Orders
//! [`OrderManagement`] stores orders, their items and their append-only event log. Every status change is a
//! conditional write (`WHERE status = <expected>`), and any money that moves because of the change is posted to the
//! ledger in the same transaction.
//!
//! ## Wallets
//! [`WalletManagement`] owns the ledger. A wallet's balance is only ever changed by applying a [`LedgerEntry`], which
//! updates the balance atomically and appends an immutable transaction row.
//!
//! ## Traits
//! * [`MarketplaceDatabase`] bundles all of the storage traits. The APIs in [`crate::market_api`] are generic over it.
//! * [`OrderManagement`] for orders, items, events and disputes.
//! * [`WalletManagement`] for wallets and the ledger.
//! * [`CreditPurchaseManagement`] for the credit package catalogue and purchase records.
//! * [`FeeTierManagement`] for the fee tier table.
//! * [`ConversationManagement`] for the chat conversation existence checks.
//! * [`PaymentGateway`] is not a storage trait. It abstracts the external payment provider.
//!
//! [`LedgerEntry`]: crate::db_types::LedgerEntry
mod conversations;
mod credit_purchases;
mod fee_tiers;
mod marketplace_database;
mod order_management;
mod payment_gateway;
mod wallet_management;

pub use conversations::ConversationManagement;
pub use credit_purchases::CreditPurchaseManagement;
pub use fee_tiers::FeeTierManagement;
pub use marketplace_database::{ErrorKind, MarketplaceDatabase, MarketplaceError};
pub use order_management::OrderManagement;
pub use payment_gateway::{
    CheckoutRequest,
    CheckoutSession,
    CheckoutUrls,
    GatewayError,
    GatewayPayment,
    GatewayPaymentStatus,
    PaymentGateway,
    PaymentPurpose,
};
pub use wallet_management::WalletManagement;
