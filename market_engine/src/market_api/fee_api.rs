use std::fmt::Debug;

use log::*;
use rust_decimal::Decimal;

use crate::{
    db_types::{FeeTier, Money, NewFeeTier},
    fees::{calculate_fees, FeeBreakdown, FeeConfig},
    traits::{FeeTierManagement, MarketplaceError},
};

/// Quotes fees against the tier table in the store, and lets admins maintain that table.
#[derive(Clone)]
pub struct FeeApi<B> {
    db: B,
    config: FeeConfig,
}

impl<B> Debug for FeeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FeeApi (fallback {}%, minimum {})", self.config.fallback_percentage, self.config.minimum_fee)
    }
}

impl<B> FeeApi<B> {
    pub fn new(db: B, config: FeeConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }
}

impl<B> FeeApi<B>
where B: FeeTierManagement
{
    pub async fn quote(&self, amount: Money) -> Result<FeeBreakdown, MarketplaceError> {
        let tiers = self.db.fetch_active_fee_tiers().await?;
        let quote = calculate_fees(amount, &tiers, &self.config)?;
        trace!("🧾️ Quoted {} on {amount} ({})", quote.total_fee, quote.tier_description);
        Ok(quote)
    }

    pub async fn tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError> {
        self.db.fetch_active_fee_tiers().await
    }

    pub async fn all_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError> {
        self.db.fetch_all_fee_tiers().await
    }

    pub async fn add_tier(&self, tier: NewFeeTier) -> Result<FeeTier, MarketplaceError> {
        validate_tier(&tier)?;
        let tier = self.db.insert_fee_tier(tier).await?;
        info!("🧾️ Fee tier {} added: {}% from {} ({})", tier.id, tier.fee_percentage, tier.min_value, tier.description);
        Ok(tier)
    }

    pub async fn deactivate_tier(&self, tier_id: i64) -> Result<FeeTier, MarketplaceError> {
        let tier = self.db.set_fee_tier_active(tier_id, false).await?.ok_or(MarketplaceError::FeeTierNotFound(tier_id))?;
        info!("🧾️ Fee tier {tier_id} ({}) deactivated", tier.description);
        Ok(tier)
    }
}

fn validate_tier(tier: &NewFeeTier) -> Result<(), MarketplaceError> {
    if tier.fee_percentage.is_sign_negative() || tier.fee_percentage >= Decimal::ONE_HUNDRED {
        return Err(MarketplaceError::ValidationError(format!(
            "A fee percentage must be at least 0 and below 100. Got {}",
            tier.fee_percentage
        )));
    }
    if tier.min_value.is_negative() {
        return Err(MarketplaceError::ValidationError("A fee tier cannot start below zero".to_string()));
    }
    if tier.max_value.is_some_and(|max| max < tier.min_value) {
        return Err(MarketplaceError::ValidationError(format!(
            "The tier upper bound is below its lower bound of {}",
            tier.min_value
        )));
    }
    if tier.description.trim().is_empty() {
        return Err(MarketplaceError::ValidationError("A fee tier needs a description".to_string()));
    }
    Ok(())
}
