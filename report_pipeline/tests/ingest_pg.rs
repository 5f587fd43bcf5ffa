//! Live-database integration tests for the ingestion writer.
//!
//! Ignored by default: they need a reachable Postgres via `DATABASE_URL`
//! (a `.env` file works). Run with `cargo test -- --ignored`.

use chrono::{TimeZone, Utc};
use report_pipeline::errors::PipelineError;
use report_pipeline::ingest::{ensure_schema, ping, write_export};
use serde_json::{Value, json};
use sqlx::PgPool;

async fn pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
    PgPool::connect(&url).await.expect("connect to Postgres")
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn schema_bootstrap_and_ping() {
    let pool = pool().await;
    ping(&pool).await.unwrap();
    ensure_schema(&pool).await.unwrap();
    // Second call must be a no-op.
    ensure_schema(&pool).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn rerun_for_same_date_appends_a_second_row() {
    let pool = pool().await;
    ensure_schema(&pool).await.unwrap();

    // Marker instant no real run produces; cleanup is test-harness work,
    // the component itself has no delete path.
    let marker = Utc.with_ymd_and_hms(1999, 1, 2, 3, 4, 5).unwrap();
    sqlx::query("DELETE FROM exports WHERE export_date = $1")
        .bind(marker)
        .execute(&pool)
        .await
        .unwrap();

    let payload = json!({
        "Global": {
            "Shops": [{"total_ht": 10, "total": 12, "volume": 1, "order_count": 2}]
        }
    });
    write_export(&pool, &payload, marker).await.unwrap();
    write_export(&pool, &payload, marker).await.unwrap();

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM exports WHERE export_date = $1")
            .bind(marker)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 2, "append-only store must not dedupe by date");

    // The raw payload column is the verbatim export.
    let (raw,): (String,) =
        sqlx::query_as("SELECT raw_data FROM exports WHERE export_date = $1 LIMIT 1")
            .bind(marker)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), payload);
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn invalid_payload_writes_nothing() {
    let pool = pool().await;
    ensure_schema(&pool).await.unwrap();

    let marker = Utc.with_ymd_and_hms(1999, 6, 7, 8, 9, 10).unwrap();
    sqlx::query("DELETE FROM exports WHERE export_date = $1")
        .bind(marker)
        .execute(&pool)
        .await
        .unwrap();

    let err = write_export(&pool, &json!({"Shops": []}), marker)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidPayloadShape(_)));

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM exports WHERE export_date = $1")
            .bind(marker)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}
