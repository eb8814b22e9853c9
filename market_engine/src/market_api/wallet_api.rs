use std::fmt::Debug;

use log::*;
use serde::Serialize;

use crate::{
    db_types::{Money, Wallet, WalletPosting, WalletTransaction, WalletTransactionType, REF_ADMIN, REF_WITHDRAWAL},
    traits::{MarketplaceError, WalletManagement},
};

/// The result of replaying a wallet's ledger against its cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletAudit {
    pub wallet: Wallet,
    pub transaction_count: usize,
    pub ledger_sum: Money,
    pub last_balance_after: Money,
}

#[derive(Clone)]
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub async fn wallet_for_user(&self, user_id: &str) -> Result<Wallet, MarketplaceError> {
        self.db.fetch_wallet_for_user(user_id).await?.ok_or_else(|| MarketplaceError::WalletNotFound(user_id.to_string()))
    }

    pub async fn fetch_or_create_wallet(&self, user_id: &str) -> Result<Wallet, MarketplaceError> {
        if user_id.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("A wallet needs an owner".to_string()));
        }
        self.db.fetch_or_create_wallet(user_id).await
    }

    pub async fn transactions_for_user(&self, user_id: &str) -> Result<Vec<WalletTransaction>, MarketplaceError> {
        let wallet = self.wallet_for_user(user_id).await?;
        self.db.fetch_wallet_transactions(wallet.id).await
    }

    /// Applies a manual correction of either sign. The wallet is created if the user does not have one yet.
    pub async fn adjust_balance(
        &self,
        user_id: &str,
        amount: Money,
        reason: &str,
        actor: &str,
    ) -> Result<WalletTransaction, MarketplaceError> {
        if amount.is_zero() {
            return Err(MarketplaceError::InvalidLedgerEntry("An adjustment of zero changes nothing".to_string()));
        }
        if reason.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("An adjustment needs a reason".to_string()));
        }
        let mut posting = WalletPosting::new(user_id, WalletTransactionType::Adjustment, amount)
            .with_description(format!("{reason} (by {actor})"));
        // Adjustments are never deduplicated, so they carry no reference id
        posting.reference_type = Some(REF_ADMIN.to_string());
        let tx = self.db.post_to_user(posting).await?;
        warn!("💰️ {actor} adjusted the wallet of {user_id} by {amount}. New balance {}. {reason}", tx.balance_after);
        Ok(tx)
    }

    /// Pays out `amount` from the user's wallet. `payout_reference` identifies the payout, and a second withdrawal
    /// with the same reference is rejected as a duplicate.
    pub async fn withdraw(
        &self,
        user_id: &str,
        amount: Money,
        payout_reference: &str,
    ) -> Result<WalletTransaction, MarketplaceError> {
        if !amount.is_positive() {
            return Err(MarketplaceError::ValidationError(format!("Withdrawals must be positive. Got {amount}")));
        }
        if payout_reference.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("A withdrawal needs a payout reference".to_string()));
        }
        let wallet = self.wallet_for_user(user_id).await?;
        let posting = WalletPosting::new(user_id, WalletTransactionType::Withdrawal, -amount)
            .with_reference(REF_WITHDRAWAL, payout_reference)
            .with_description(format!("Payout {payout_reference}"));
        let tx = self.db.apply_ledger_entry(posting.into_entry(wallet.id)).await?;
        info!("💰️ {user_id} withdrew {amount}. New balance {}", tx.balance_after);
        Ok(tx)
    }

    /// Replays the ledger of the user's wallet and checks that the cached balance, the sum of all entries and the
    /// `balance_after` of the most recent entry all agree.
    pub async fn audit_wallet(&self, user_id: &str) -> Result<WalletAudit, MarketplaceError> {
        let wallet = self.wallet_for_user(user_id).await?;
        let transactions = self.db.fetch_wallet_transactions(wallet.id).await?;
        let ledger_sum = transactions.iter().map(|t| t.amount).sum::<Money>();
        let last_balance_after = transactions.last().map(|t| t.balance_after).unwrap_or_default();
        if wallet.balance != ledger_sum || wallet.balance != last_balance_after {
            let msg = format!(
                "Wallet {} of {user_id} has balance {}, but its {} entries sum to {ledger_sum} and the last entry \
                 left {last_balance_after}",
                wallet.id,
                wallet.balance,
                transactions.len()
            );
            error!("💰️ {msg}");
            return Err(MarketplaceError::LedgerInconsistency(msg));
        }
        debug!("💰️ Wallet {} of {user_id} is consistent over {} entries", wallet.id, transactions.len());
        Ok(WalletAudit { wallet, transaction_count: transactions.len(), ledger_sum, last_balance_after })
    }
}
