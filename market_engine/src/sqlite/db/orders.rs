use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{Money, NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatusType},
    order_objects::{OrderQueryFilter, StatusChange},
    traits::MarketplaceError,
};

/// Inserts a new order using the given connection. The order starts out as `pending`. This is not atomic. Embed this
/// call inside a transaction along with the items and the creation event.
pub async fn insert_order(
    order: &NewOrder,
    platform_fee: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (buyer_id, seller_id, listing_id, total_amount, platform_fee)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&order.buyer_id)
    .bind(&order.seller_id)
    .bind(&order.listing_id)
    .bind(order.total_amount)
    .bind(platform_fee)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} inserted for buyer {}", order.id, order.buyer_id);
    Ok(order)
}

pub async fn insert_order_item(
    order_id: OrderId,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, MarketplaceError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, listing_id, title, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(&item.listing_id)
    .bind(&item.title)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Results are ordered by `id`, i.e. by creation order, and paginated with the filter's limit and offset.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM orders ");
    let limit = query.page_size();
    let offset = query.page_offset();
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(seller_id) = query.seller_id {
        where_clause.push("seller_id = ");
        where_clause.push_bind_unseparated(seller_id);
    }
    if let Some(listing_id) = query.listing_id {
        where_clause.push("listing_id = ");
        where_clause.push_bind_unseparated(listing_id);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY id ASC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Order search returned {} results", orders.len());
    Ok(orders)
}

/// Conditionally updates the status of an order. The row is only touched if its current status is `change.from`.
///
/// Returns `None` if no row matched, i.e. the order does not exist or its status has moved on.
pub async fn update_order_status(
    change: &StatusChange,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP");
    builder.push(", status = ");
    builder.push_bind(change.to);
    match change.to {
        OrderStatusType::Paid => {
            builder.push(", confirmed_at = CURRENT_TIMESTAMP");
        },
        OrderStatusType::Completed => {
            builder.push(", completed_at = CURRENT_TIMESTAMP");
        },
        OrderStatusType::Cancelled => {
            builder.push(", cancelled_at = CURRENT_TIMESTAMP");
        },
        _ => {},
    }
    if change.paid_out {
        builder.push(", paid_out_at = CURRENT_TIMESTAMP");
    }
    if let Some(payment_id) = &change.payment_id {
        builder.push(", payment_id = ");
        builder.push_bind(payment_id.clone());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(change.order_id);
    builder.push(" AND status = ");
    builder.push_bind(change.from);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

pub async fn set_preference_id(
    order_id: OrderId,
    preference_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET preference_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(preference_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn delete_order_items(order_id: OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Deletes the order row only. Dependent rows must already be gone.
pub async fn delete_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
