use sqlx::SqliteConnection;

use crate::db_types::{Dispute, NewDispute, OrderId};

pub async fn insert_dispute(dispute: &NewDispute, conn: &mut SqliteConnection) -> Result<Dispute, sqlx::Error> {
    let dispute = sqlx::query_as(
        r#"
            INSERT INTO disputes (order_id, opened_by, reason)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(dispute.order_id)
    .bind(&dispute.opened_by)
    .bind(&dispute.reason)
    .fetch_one(conn)
    .await?;
    Ok(dispute)
}

pub async fn fetch_dispute(dispute_id: i64, conn: &mut SqliteConnection) -> Result<Option<Dispute>, sqlx::Error> {
    let dispute = sqlx::query_as("SELECT * FROM disputes WHERE id = $1").bind(dispute_id).fetch_optional(conn).await?;
    Ok(dispute)
}

pub async fn fetch_disputes_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Dispute>, sqlx::Error> {
    let disputes = sqlx::query_as("SELECT * FROM disputes WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(disputes)
}

/// Marks an unresolved dispute as resolved. Returns `None` if the dispute does not exist or is already resolved.
pub async fn resolve_dispute(
    dispute_id: i64,
    resolution: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Dispute>, sqlx::Error> {
    let dispute = sqlx::query_as(
        r#"
            UPDATE disputes SET
                status = 'RESOLVED',
                resolution = $1,
                resolved_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status <> 'RESOLVED'
            RETURNING *;
        "#,
    )
    .bind(resolution)
    .bind(dispute_id)
    .fetch_optional(conn)
    .await?;
    Ok(dispute)
}

pub async fn delete_disputes(order_id: OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM disputes WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}
