use crate::{
    db_types::{LedgerEntry, Wallet, WalletPosting, WalletTransaction},
    traits::MarketplaceError,
};

/// The wallet ledger.
///
/// A wallet balance is a denormalised cache of the sum of its transactions. Backends must keep the two in step by
/// only ever changing a balance through [`WalletManagement::apply_ledger_entry`], which performs the balance update and
/// the transaction insert in one atomic unit. The balance is never read and then written back.
#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    async fn fetch_wallet_for_user(&self, user_id: &str) -> Result<Option<Wallet>, MarketplaceError>;

    async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, MarketplaceError>;

    /// Returns the user's wallet, creating an empty one if it does not exist yet. Safe to call concurrently.
    async fn fetch_or_create_wallet(&self, user_id: &str) -> Result<Wallet, MarketplaceError>;

    /// Applies a single signed amount to a wallet and records it.
    ///
    /// ## Failure modes
    /// * [`MarketplaceError::InvalidLedgerEntry`] if the sign of the amount contradicts the transaction type.
    /// * [`MarketplaceError::WalletNotFound`] if the wallet does not exist.
    /// * [`MarketplaceError::InsufficientFunds`] if the balance would go negative.
    /// * [`MarketplaceError::DuplicateEntry`] if an entry of the same type was already recorded for the same reference.
    async fn apply_ledger_entry(&self, entry: LedgerEntry) -> Result<WalletTransaction, MarketplaceError>;

    /// Like [`WalletManagement::apply_ledger_entry`], but addressed to a user. The wallet is created if necessary.
    async fn post_to_user(&self, posting: WalletPosting) -> Result<WalletTransaction, MarketplaceError>;

    /// All transactions for the wallet, in the order they were applied.
    async fn fetch_wallet_transactions(&self, wallet_id: i64) -> Result<Vec<WalletTransaction>, MarketplaceError>;
}
