use async_trait::async_trait;
use bytes::Bytes;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

use crate::item::Item;
use crate::store::{seed, RecordStore, StoreError};

const CREATE_ITEMS: &str = r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100),
        quantity INTEGER,
        price DOUBLE PRECISION,
        description TEXT
    )
"#;

const CREATE_DATA: &str = r#"
    CREATE TABLE IF NOT EXISTS data (
        id TEXT,
        data BYTEA
    )
"#;

/// Record store backed by PostgreSQL: the catalog lives in `items`, uploads are appended
/// to `data`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        options: PgConnectOptions,
        max_connections: u32,
    ) -> Result<PgStore, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("Connected to PostgreSQL database");

        Ok(PgStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> PgStore {
        PgStore { pool }
    }

    /// Creates the `items` and `data` tables if they don't exist yet.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_ITEMS).execute(&self.pool).await?;
        sqlx::query(CREATE_DATA).execute(&self.pool).await?;

        debug!("Database schema ready");
        Ok(())
    }

    /// Makes sure the catalog holds at least `count` items. A smaller catalog is replaced
    /// entirely, restarting ids from 1.
    #[instrument(skip(self))]
    pub async fn seed(&self, count: usize) -> Result<(), StoreError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        if usize::try_from(existing).map_or(false, |existing| existing >= count) {
            debug!(existing, "Items table already seeded");
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("TRUNCATE TABLE items RESTART IDENTITY")
            .execute(&mut *tx)
            .await?;

        for item in seed::catalog(count) {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                StoreError::InvalidRow(format!(
                    "item {} quantity {} out of range",
                    item.id, item.quantity
                ))
            })?;

            sqlx::query(
                "INSERT INTO items (name, quantity, price, description) VALUES ($1, $2, $3, $4)",
            )
            .bind(&item.name)
            .bind(quantity)
            .bind(item.price)
            .bind(&item.description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(count, "Items table seeded");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        // Casts keep older schemas (SERIAL ids, REAL prices) readable. Every column but the
        // id is nullable; a NULL reads as the empty string or zero.
        let rows: Vec<(i64, String, i32, f64, String)> = sqlx::query_as(
            r#"
            SELECT
                id::BIGINT,
                COALESCE(name, ''),
                COALESCE(quantity, 0),
                COALESCE(price, 0)::DOUBLE PRECISION,
                COALESCE(description, '')
            FROM items
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, quantity, price, description)| {
                let quantity = u32::try_from(quantity).map_err(|_| {
                    StoreError::InvalidRow(format!("item {} has negative quantity {}", id, quantity))
                })?;

                Ok(Item {
                    id,
                    name,
                    quantity,
                    price,
                    description,
                })
            })
            .collect()
    }

    async fn append_record(&self, client_id: &str, payload: Bytes) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO data (id, data) VALUES ($1, $2)")
            .bind(client_id)
            .bind(&payload[..])
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
