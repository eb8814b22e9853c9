use log::{debug, trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{LedgerEntry, Money, Wallet, WalletTransaction},
    traits::MarketplaceError,
};

pub async fn fetch_wallet_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}

pub async fn fetch_wallet(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE id = $1").bind(wallet_id).fetch_optional(conn).await?;
    Ok(wallet)
}

/// Returns the wallet for the user, creating an empty one first if necessary.
///
/// The insert is issued unconditionally (and ignored on conflict), so that the call is race-free and, inside a
/// transaction, takes the write lock up front.
pub async fn fetch_or_create_wallet(user_id: &str, conn: &mut SqliteConnection) -> Result<Wallet, MarketplaceError> {
    let inserted = sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if inserted.rows_affected() > 0 {
        debug!("💰️ Created a new wallet for {user_id}");
    }
    fetch_wallet_for_user(user_id, conn).await?.ok_or_else(|| MarketplaceError::WalletNotFound(user_id.to_string()))
}

/// Applies a ledger entry. This is not atomic on its own: the balance update and the transaction insert must run
/// inside the same database transaction, so that a failed insert rolls the balance back too.
///
/// The balance is changed by a single conditional `UPDATE ... RETURNING`, which both serialises concurrent writers on
/// the wallet and refuses to take the balance below zero.
pub async fn apply_ledger_entry(
    entry: LedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, MarketplaceError> {
    entry.validate().map_err(|e| MarketplaceError::InvalidLedgerEntry(e.0))?;
    let aggregate = entry
        .transaction_type
        .aggregate_column()
        .map(|col| format!(", {col} = {col} + $2"))
        .unwrap_or_default();
    let sql = format!(
        "UPDATE wallets SET balance = balance + $1{aggregate}, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND \
         balance + $1 >= 0 RETURNING balance"
    );
    let new_balance: Option<Money> = sqlx::query_scalar(&sql)
        .bind(entry.amount)
        .bind(entry.amount.abs())
        .bind(entry.wallet_id)
        .fetch_optional(&mut *conn)
        .await?;
    let balance_after = match new_balance {
        Some(b) => b,
        None => {
            return match fetch_wallet(entry.wallet_id, conn).await? {
                None => Err(MarketplaceError::WalletNotFound(format!("wallet id {}", entry.wallet_id))),
                Some(w) => {
                    warn!(
                        "💰️ Wallet {} has a balance of {}. A {} of {} was refused.",
                        w.id, w.balance, entry.transaction_type, entry.amount
                    );
                    Err(MarketplaceError::InsufficientFunds { wallet_id: w.id, amount: entry.amount })
                },
            };
        },
    };
    trace!("💰️ Wallet {} balance is now {balance_after}", entry.wallet_id);
    let tx: WalletTransaction = sqlx::query_as(
        r#"
            INSERT INTO wallet_transactions
                (wallet_id, transaction_type, amount, balance_after, reference_type, reference_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(entry.wallet_id)
    .bind(entry.transaction_type)
    .bind(entry.amount)
    .bind(balance_after)
    .bind(entry.reference_type)
    .bind(entry.reference_id)
    .bind(entry.description)
    .fetch_one(conn)
    .await?;
    debug!(
        "💰️ Posted {} of {} to wallet {}. Balance after: {}",
        tx.transaction_type, tx.amount, tx.wallet_id, tx.balance_after
    );
    Ok(tx)
}

pub async fn fetch_transactions(
    wallet_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM wallet_transactions WHERE wallet_id = $1 ORDER BY id")
        .bind(wallet_id)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}
