use crate::{
    db_types::{FeeTier, NewFeeTier},
    traits::MarketplaceError,
};

#[allow(async_fn_in_trait)]
pub trait FeeTierManagement {
    /// The tiers the fee calculator should consider.
    async fn fetch_active_fee_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError>;

    async fn fetch_all_fee_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError>;

    async fn insert_fee_tier(&self, tier: NewFeeTier) -> Result<FeeTier, MarketplaceError>;

    /// Switches a tier on or off. Returns `None` if the tier does not exist.
    async fn set_fee_tier_active(&self, tier_id: i64, active: bool) -> Result<Option<FeeTier>, MarketplaceError>;
}
