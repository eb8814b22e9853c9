use crate::{
    db_types::{CreditPackage, CreditPurchase, NewCreditPurchase, WalletTransaction},
    traits::MarketplaceError,
};

/// Storage behaviour for the credit package catalogue and for wallet top-ups bought through the payment gateway.
#[allow(async_fn_in_trait)]
pub trait CreditPurchaseManagement {
    /// The packages currently for sale.
    async fn fetch_credit_packages(&self) -> Result<Vec<CreditPackage>, MarketplaceError>;

    async fn fetch_credit_package(&self, package_id: i64) -> Result<Option<CreditPackage>, MarketplaceError>;

    async fn insert_credit_purchase(&self, purchase: NewCreditPurchase) -> Result<CreditPurchase, MarketplaceError>;

    async fn fetch_credit_purchase(&self, purchase_id: i64) -> Result<Option<CreditPurchase>, MarketplaceError>;

    async fn set_credit_purchase_preference(
        &self,
        purchase_id: i64,
        preference_id: &str,
    ) -> Result<CreditPurchase, MarketplaceError>;

    /// Completes a pending purchase. In a single atomic transaction:
    /// * The purchase moves from `pending` to `completed` (conditionally, so only one caller can win).
    /// * A `DEPOSIT` of the purchased credits is posted to the buyer's wallet, which is created if necessary.
    /// * A `BONUS_CREDIT` is posted if the purchase carries bonus credits.
    ///
    /// Returns `None` if the purchase was not pending, in which case nothing is changed.
    async fn complete_credit_purchase(
        &self,
        purchase_id: i64,
        payment_id: &str,
    ) -> Result<Option<(CreditPurchase, Vec<WalletTransaction>)>, MarketplaceError>;

    /// Moves a pending purchase to `failed`. Returns `None` if the purchase was not pending.
    async fn fail_credit_purchase(
        &self,
        purchase_id: i64,
        payment_id: &str,
    ) -> Result<Option<CreditPurchase>, MarketplaceError>;
}
