use sqlx::SqliteConnection;

use crate::db_types::{CreditPackage, CreditPurchase, NewCreditPurchase};

pub async fn fetch_active_packages(conn: &mut SqliteConnection) -> Result<Vec<CreditPackage>, sqlx::Error> {
    let packages =
        sqlx::query_as("SELECT * FROM credit_packages WHERE active = 1 ORDER BY price").fetch_all(conn).await?;
    Ok(packages)
}

pub async fn fetch_package(package_id: i64, conn: &mut SqliteConnection) -> Result<Option<CreditPackage>, sqlx::Error> {
    let package =
        sqlx::query_as("SELECT * FROM credit_packages WHERE id = $1").bind(package_id).fetch_optional(conn).await?;
    Ok(package)
}

pub async fn insert_purchase(
    purchase: NewCreditPurchase,
    conn: &mut SqliteConnection,
) -> Result<CreditPurchase, sqlx::Error> {
    let purchase = sqlx::query_as(
        r#"
            INSERT INTO credit_purchases (user_id, package_id, credits, bonus_credits, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(purchase.user_id)
    .bind(purchase.package_id)
    .bind(purchase.credits)
    .bind(purchase.bonus_credits)
    .bind(purchase.price)
    .fetch_one(conn)
    .await?;
    Ok(purchase)
}

pub async fn fetch_purchase(
    purchase_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CreditPurchase>, sqlx::Error> {
    let purchase =
        sqlx::query_as("SELECT * FROM credit_purchases WHERE id = $1").bind(purchase_id).fetch_optional(conn).await?;
    Ok(purchase)
}

pub async fn set_preference_id(
    purchase_id: i64,
    preference_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CreditPurchase>, sqlx::Error> {
    let purchase = sqlx::query_as(
        "UPDATE credit_purchases SET preference_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(preference_id)
    .bind(purchase_id)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}

/// Moves a `pending` purchase to `completed`. Returns `None` if the purchase was not pending.
pub async fn mark_completed(
    purchase_id: i64,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CreditPurchase>, sqlx::Error> {
    let purchase = sqlx::query_as(
        r#"
            UPDATE credit_purchases SET
                status = 'completed',
                payment_id = $1,
                completed_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(purchase_id)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}

/// Moves a `pending` purchase to `failed`. Returns `None` if the purchase was not pending.
pub async fn mark_failed(
    purchase_id: i64,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CreditPurchase>, sqlx::Error> {
    let purchase = sqlx::query_as(
        r#"
            UPDATE credit_purchases SET status = 'failed', payment_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(purchase_id)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}
