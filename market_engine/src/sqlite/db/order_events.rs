use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{OrderEvent, OrderId};

pub async fn insert_event(
    order_id: OrderId,
    event_type: &str,
    payload: Value,
    actor: &str,
    conn: &mut SqliteConnection,
) -> Result<OrderEvent, sqlx::Error> {
    let event = sqlx::query_as(
        r#"
            INSERT INTO order_events (order_id, event_type, payload, actor)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(event_type)
    .bind(Json(payload))
    .bind(actor)
    .fetch_one(conn)
    .await?;
    Ok(event)
}

pub async fn fetch_events(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM order_events WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}

pub async fn delete_events(order_id: OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM order_events WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}
