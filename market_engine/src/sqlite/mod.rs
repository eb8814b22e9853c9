//! SQLite backend for the marketplace engine.
//!
//! [`SqliteDatabase`] implements every storage trait in [`crate::traits`]. The schema lives in the `migrations`
//! directory and is embedded into the binary.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
