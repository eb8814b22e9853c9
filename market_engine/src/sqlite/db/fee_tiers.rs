use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use crate::db_types::{FeeTier, NewFeeTier};

// Percentages are stored as text so that they round-trip exactly.
impl<'r> FromRow<'r, SqliteRow> for FeeTier {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let pct: String = row.try_get("fee_percentage")?;
        let fee_percentage = Decimal::from_str(pct.trim())
            .map_err(|e| sqlx::Error::ColumnDecode { index: "fee_percentage".to_string(), source: Box::new(e) })?;
        Ok(FeeTier {
            id: row.try_get("id")?,
            min_value: row.try_get("min_value")?,
            max_value: row.try_get("max_value")?,
            fee_percentage,
            description: row.try_get("description")?,
            active: row.try_get("active")?,
        })
    }
}

pub async fn fetch_active_tiers(conn: &mut SqliteConnection) -> Result<Vec<FeeTier>, sqlx::Error> {
    let tiers = sqlx::query_as("SELECT * FROM fee_tiers WHERE active = 1 ORDER BY min_value").fetch_all(conn).await?;
    Ok(tiers)
}

pub async fn fetch_all_tiers(conn: &mut SqliteConnection) -> Result<Vec<FeeTier>, sqlx::Error> {
    let tiers = sqlx::query_as("SELECT * FROM fee_tiers ORDER BY min_value, id").fetch_all(conn).await?;
    Ok(tiers)
}

pub async fn insert_tier(tier: NewFeeTier, conn: &mut SqliteConnection) -> Result<FeeTier, sqlx::Error> {
    let tier = sqlx::query_as(
        r#"
            INSERT INTO fee_tiers (min_value, max_value, fee_percentage, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(tier.min_value)
    .bind(tier.max_value)
    .bind(tier.fee_percentage.to_string())
    .bind(tier.description)
    .fetch_one(conn)
    .await?;
    Ok(tier)
}

pub async fn set_active(tier_id: i64, active: bool, conn: &mut SqliteConnection) -> Result<Option<FeeTier>, sqlx::Error> {
    let tier = sqlx::query_as("UPDATE fee_tiers SET active = $1 WHERE id = $2 RETURNING *")
        .bind(active)
        .bind(tier_id)
        .fetch_optional(conn)
        .await?;
    Ok(tier)
}
