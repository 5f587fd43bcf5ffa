//! Ingestion of a parsed sales payload into Postgres.
//!
//! The payload must carry a `"Global"` key; shop records under
//! `"Global"."Shops"` are summed into per-run aggregates and written as one
//! row together with the verbatim serialized payload (auditability/replay).
//! The table is append-only from this component's perspective: there is no
//! update or delete path, and no unique constraint on `export_date` — a
//! re-run for the same date inserts a second row by design.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;

use crate::errors::PipelineError;

const CREATE_EXPORTS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS exports (
    id              BIGSERIAL PRIMARY KEY,
    export_date     TIMESTAMPTZ NOT NULL,
    total_shops     BIGINT NOT NULL,
    global_total_ht DOUBLE PRECISION NOT NULL,
    global_total    DOUBLE PRECISION NOT NULL,
    total_volume    DOUBLE PRECISION NOT NULL,
    total_orders    BIGINT NOT NULL,
    raw_data        TEXT NOT NULL
)";

const INSERT_EXPORT: &str = "\
INSERT INTO exports (
    export_date, total_shops, global_total_ht,
    global_total, total_volume, total_orders, raw_data
) VALUES ($1, $2, $3, $4, $5, $6, $7)";

/// Per-run aggregates summed across all shop records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShopTotals {
    pub total_shops: i64,
    pub global_total_ht: f64,
    pub global_total: f64,
    pub total_volume: f64,
    pub total_orders: i64,
}

/// Validates the payload shape and computes [`ShopTotals`].
///
/// Missing `"Global"` is [`PipelineError::InvalidPayloadShape`]. A missing
/// `"Shops"` list means zero shops; absent numeric fields on a shop count
/// as 0.
pub fn summarize(payload: &Value) -> Result<ShopTotals, PipelineError> {
    let global = payload.get("Global").ok_or_else(|| {
        PipelineError::InvalidPayloadShape("missing \"Global\" key".to_string())
    })?;

    let empty = Vec::new();
    let shops = global
        .get("Shops")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut totals = ShopTotals {
        total_shops: shops.len() as i64,
        ..ShopTotals::default()
    };
    for shop in shops {
        totals.global_total_ht += number(shop, "total_ht");
        totals.global_total += number(shop, "total");
        totals.total_volume += number(shop, "volume");
        totals.total_orders += order_count(shop);
    }
    Ok(totals)
}

fn number(shop: &Value, key: &str) -> f64 {
    shop.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

// Some exports serialize counts as floats ("order_count": 2.0); accept any
// numeric representation.
fn order_count(shop: &Value) -> i64 {
    shop.get("order_count")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .unwrap_or(0)
}

/// Startup connection probe; logs the server clock.
pub async fn ping(pool: &PgPool) -> Result<(), PipelineError> {
    let (server_time,): (DateTime<Utc>,) =
        sqlx::query_as("SELECT NOW()").fetch_one(pool).await?;
    info!(%server_time, "database connection verified");
    Ok(())
}

/// Creates the `exports` table when absent. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), PipelineError> {
    sqlx::query(CREATE_EXPORTS_TABLE).execute(pool).await?;
    Ok(())
}

/// Writes one aggregate row plus the verbatim payload inside a single
/// transaction. Validation happens before the transaction opens, so an
/// invalid payload never produces a partial insert; an insert failure rolls
/// the transaction back (dropped uncommitted) and surfaces as
/// [`PipelineError::PersistenceFailed`].
pub async fn write_export(
    pool: &PgPool,
    payload: &Value,
    export_date: DateTime<Utc>,
) -> Result<ShopTotals, PipelineError> {
    let totals = summarize(payload)?;
    let raw = serde_json::to_string(payload)?;

    let mut tx = pool.begin().await?;
    sqlx::query(INSERT_EXPORT)
        .bind(export_date)
        .bind(totals.total_shops)
        .bind(totals.global_total_ht)
        .bind(totals.global_total)
        .bind(totals.total_volume)
        .bind(totals.total_orders)
        .bind(&raw)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        %export_date,
        total_shops = totals.total_shops,
        global_total_ht = totals.global_total_ht,
        global_total = totals.global_total,
        total_volume = totals.total_volume,
        total_orders = totals.total_orders,
        "export row written"
    );
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aggregates_across_shops() {
        let payload = json!({
            "Global": {
                "Shops": [
                    {"total_ht": 10, "total": 12, "volume": 1, "order_count": 2},
                    {"total_ht": 5, "total": 6, "volume": 1, "order_count": 1}
                ]
            }
        });
        let totals = summarize(&payload).unwrap();
        assert_eq!(
            totals,
            ShopTotals {
                total_shops: 2,
                global_total_ht: 15.0,
                global_total: 18.0,
                total_volume: 2.0,
                total_orders: 3,
            }
        );
    }

    #[test]
    fn absent_numeric_fields_count_as_zero() {
        let payload = json!({
            "Global": {
                "Shops": [
                    {"total": 12.5},
                    {"name": "no numbers at all"}
                ]
            }
        });
        let totals = summarize(&payload).unwrap();
        assert_eq!(totals.total_shops, 2);
        assert_eq!(totals.global_total, 12.5);
        assert_eq!(totals.global_total_ht, 0.0);
        assert_eq!(totals.total_orders, 0);
    }

    #[test]
    fn float_order_counts_are_still_counted() {
        let payload = json!({
            "Global": {
                "Shops": [
                    {"order_count": 2.0},
                    {"order_count": 1}
                ]
            }
        });
        let totals = summarize(&payload).unwrap();
        assert_eq!(totals.total_orders, 3);
    }

    #[test]
    fn missing_shops_list_means_zero_shops() {
        let totals = summarize(&json!({"Global": {}})).unwrap();
        assert_eq!(totals, ShopTotals::default());
    }

    #[test]
    fn missing_global_key_is_invalid_shape() {
        let err = summarize(&json!({"Shops": []})).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPayloadShape(_)));
        assert!(err.to_string().contains("Global"));
    }

    #[test]
    fn non_object_payload_is_invalid_shape() {
        for payload in [json!([1, 2, 3]), json!("text"), json!(null)] {
            assert!(matches!(
                summarize(&payload),
                Err(PipelineError::InvalidPayloadShape(_))
            ));
        }
    }
}
