use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, Catalog, EventEnvelope, EventId, EventStoreError, Money, Product, ProductId,
    Result, Version,
    store::{Commit, EventStore, EventStream, check_stream_version},
};

/// Advisory lock key taken by every commit that appends events.
///
/// Holding it for the whole transaction makes `events.sequence` follow commit
/// order, which projections rely on when they resume by position. Commits to
/// different orders therefore run one at a time.
const APPEND_LOCK_KEY: i64 = 0x0E5_7A11;

/// PostgreSQL-backed event store and catalog.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let stock: i64 = row.try_get("stock")?;
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            stock: u32::try_from(stock).unwrap_or_default(),
        })
    }
}

async fn current_version(conn: &mut PgConnection, aggregate_id: AggregateId) -> Result<Version> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
            .bind(aggregate_id.as_uuid())
            .fetch_one(conn)
            .await?;
    Ok(Version::new(version.unwrap_or(0)))
}

/// Removes `quantity` units only if enough stock remains.
async fn conditional_decrement(
    conn: &mut PgConnection,
    id: &ProductId,
    quantity: u32,
) -> Result<u32> {
    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock - $2, updated_at = now()
        WHERE id = $1 AND stock >= $2
        RETURNING stock
        "#,
    )
    .bind(id.as_str())
    .bind(i64::from(quantity))
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining) = remaining {
        return Ok(u32::try_from(remaining).unwrap_or_default());
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match available {
        Some(available) => Err(EventStoreError::InsufficientStock {
            product_id: id.clone(),
            requested: quantity,
            available: u32::try_from(available).unwrap_or_default(),
        }),
        None => Err(EventStoreError::ProductNotFound(id.clone())),
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn commit(&self, commit: Commit) -> Result<Vec<Version>> {
        commit.validate()?;
        let stock_totals = commit.stock_totals();

        // Dropping the transaction on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        if !commit.appends.is_empty() {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(APPEND_LOCK_KEY)
                .execute(&mut *tx)
                .await?;
        }

        for append in &commit.appends {
            let aggregate_id = append.events[0].aggregate_id;
            let current = current_version(&mut *tx, aggregate_id).await?;
            check_stream_version(append, current)?;
        }

        for (product_id, quantity) in &stock_totals {
            conditional_decrement(&mut *tx, product_id, *quantity).await?;
        }

        let mut new_versions = Vec::with_capacity(commit.appends.len());
        for append in &commit.appends {
            let mut last_version = Version::initial();
            for event in &append.events {
                let metadata_json = serde_json::to_value(&event.metadata)?;

                sqlx::query(
                    r#"
                    INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(event.event_id.as_uuid())
                .bind(&event.event_type)
                .bind(event.aggregate_id.as_uuid())
                .bind(&event.aggregate_type)
                .bind(event.version.as_i64())
                .bind(event.timestamp)
                .bind(&event.payload)
                .bind(metadata_json)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.constraint() == Some("unique_aggregate_version")
                    {
                        return EventStoreError::ConcurrencyConflict {
                            aggregate_id: event.aggregate_id,
                            expected: append.options.expected_version.unwrap_or(Version::initial()),
                            actual: event.version,
                        };
                    }
                    EventStoreError::Database(e)
                })?;

                last_version = event.version;
            }
            new_versions.push(last_version);
        }

        tx.commit().await?;
        Ok(new_versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_from(&self, skip: u64) -> Result<EventStream> {
        use futures_util::StreamExt;

        // Positions count events, and `sequence` may have gaps left by
        // rolled-back commits, so skip by row count.
        let stream = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            ORDER BY sequence ASC
            OFFSET $1
            "#,
        )
        .bind(i64::try_from(skip).unwrap_or(i64::MAX))
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl Catalog for PostgresEventStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                unit_price_cents = EXCLUDED.unit_price_cents,
                stock = EXCLUDED.stock,
                updated_at = now()
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(i64::from(product.stock))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, unit_price_cents, stock FROM products WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;
        conditional_decrement(&mut *conn, id, quantity).await
    }

    async fn restock(&self, id: &ProductId, quantity: u32) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = now()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        stock
            .map(|s| u32::try_from(s).unwrap_or_default())
            .ok_or_else(|| EventStoreError::ProductNotFound(id.clone()))
    }
}
