//! # Marketplace engine public API
//!
//! The `market_api` module exposes the programmatic API for the marketplace engine.
//! The API is modular, so that clients can pick the functionality they need. Each API holds a backend and nothing
//! else of consequence, so they are cheap to clone into web handlers.
//!
//! * [`order_flow_api`] is the order status machine. All status changes, and the ledger postings that follow from
//!   them, go through here.
//! * [`fee_api`] quotes fees and manages the fee tier table.
//! * [`wallet_api`] reads wallets and their ledgers, and applies manual adjustments and withdrawals.
//! * [`checkout_api`] starts gateway checkouts for orders and for credit packages.
//! * [`reconciler`] turns payment gateway notifications into order transitions and wallet deposits.
//! * [`conversation_api`] resolves chat conversation ids.
//!
//! The other submodules in this module are support types.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the storage traits the API needs.
//!
//! ```rust,ignore
//! use market_engine::{FeeApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/market.db", 5).await?;
//! let api = FeeApi::new(db, FeeConfig::default());
//! let quote = api.quote(Money::from_units(1000)).await?;
//! ```

pub mod checkout_api;
pub mod conversation_api;
pub mod fee_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_objects;
pub mod reconciler;
pub mod wallet_api;
