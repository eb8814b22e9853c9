//! # Fee calculator
//!
//! A pure function from a sale amount to its fee breakdown:
//!
//! 1. Pick the active tier with the largest `min_value` that still contains the amount. Fall back to
//!    [`FeeConfig::fallback_percentage`] when no tier matches.
//! 2. `total_fee = round2(amount * pct / 100)`.
//! 3. If `total_fee` is below [`FeeConfig::minimum_fee`], charge the minimum and restate `pct` as
//!    `round2(minimum / amount * 100)`.
//! 4. `processor_fee = round2(amount * processor_pct / 100)`.
//! 5. `platform_fee = max(0, total_fee - processor_fee)` and `platform_pct = pct - processor_pct`.
//! 6. `seller_receives = amount - total_fee`.
//!
//! Every rounding step rounds half away from zero to two decimal places, so that the numbers quoted to a user and the
//! numbers posted to the ledger never differ by a cent.
use log::*;
use market_common::Money;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::FeeTier;

const DEFAULT_FALLBACK_PERCENTAGE: i64 = 10;
const DEFAULT_MINIMUM_FEE_UNITS: i64 = 10;
const DEFAULT_PROCESSOR_PERCENTAGE: i64 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeeError {
    #[error("Fees can only be calculated for positive amounts. Got {0}")]
    NonPositiveAmount(Money),
    #[error("Fee calculation overflowed for amount {0}")]
    Overflow(Money),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Total fee percentage used when no tier matches the amount
    pub fallback_percentage: Decimal,
    /// The smallest total fee that will ever be charged
    pub minimum_fee: Money,
    /// The share of the total fee that the payment processor keeps
    pub processor_percentage: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fallback_percentage: Decimal::from(DEFAULT_FALLBACK_PERCENTAGE),
            minimum_fee: Money::from_units(DEFAULT_MINIMUM_FEE_UNITS),
            processor_percentage: Decimal::from(DEFAULT_PROCESSOR_PERCENTAGE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub amount: Money,
    pub total_fee: Money,
    pub total_fee_percentage: Decimal,
    pub platform_fee: Money,
    pub platform_percentage: Decimal,
    pub processor_fee: Money,
    pub seller_receives: Money,
    pub tier_description: String,
}

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the active tier with the largest `min_value` that contains `amount`, if any.
pub fn select_tier(amount: Money, tiers: &[FeeTier]) -> Option<&FeeTier> {
    tiers.iter().filter(|t| t.active && t.contains(amount)).max_by_key(|t| t.min_value)
}

pub fn calculate_fees(amount: Money, tiers: &[FeeTier], config: &FeeConfig) -> Result<FeeBreakdown, FeeError> {
    if !amount.is_positive() {
        return Err(FeeError::NonPositiveAmount(amount));
    }
    let to_money = |d: Decimal| Money::try_from(d).map_err(|_| FeeError::Overflow(amount));
    let value = amount.to_decimal();
    let hundred = Decimal::ONE_HUNDRED;

    let (mut percentage, tier_description) = match select_tier(amount, tiers) {
        Some(tier) => (tier.fee_percentage, tier.description.clone()),
        None => {
            trace!("🧾️ No fee tier matches {amount}. Using the fallback of {}%", config.fallback_percentage);
            (config.fallback_percentage, format!("Default ({}%)", config.fallback_percentage))
        },
    };

    let mut total_fee = to_money(round2(value * percentage / hundred))?;
    if total_fee < config.minimum_fee {
        trace!("🧾️ Fee of {total_fee} on {amount} is below the minimum. Charging {}", config.minimum_fee);
        total_fee = config.minimum_fee;
        percentage = round2(config.minimum_fee.to_decimal() / value * hundred);
    }
    let processor_fee = to_money(round2(value * config.processor_percentage / hundred))?;
    let platform_fee = std::cmp::max(Money::default(), total_fee - processor_fee);
    let platform_percentage = percentage - config.processor_percentage;
    let seller_receives = amount - total_fee;

    Ok(FeeBreakdown {
        amount,
        total_fee,
        total_fee_percentage: percentage,
        platform_fee,
        platform_percentage,
        processor_fee,
        seller_receives,
        tier_description,
    })
}
