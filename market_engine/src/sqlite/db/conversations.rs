use sqlx::SqliteConnection;

use crate::db_types::{ConversationKind, OrderId};

/// Direct conversations are checked first. Ids are expected to be unique across both tables.
pub async fn conversation_kind(
    conversation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ConversationKind>, sqlx::Error> {
    let direct: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM conversations WHERE id = $1)")
        .bind(conversation_id)
        .fetch_one(&mut *conn)
        .await?;
    if direct {
        return Ok(Some(ConversationKind::Direct));
    }
    let order: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_conversations WHERE id = $1)")
        .bind(conversation_id)
        .fetch_one(conn)
        .await?;
    Ok(order.then_some(ConversationKind::Order))
}

pub async fn insert_direct_conversation(conversation_id: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO conversations (id) VALUES ($1)").bind(conversation_id).execute(conn).await?;
    Ok(())
}

pub async fn insert_order_conversation(
    conversation_id: &str,
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_conversations (id, order_id) VALUES ($1, $2)")
        .bind(conversation_id)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}
