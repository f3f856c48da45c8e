//! PostgreSQL product store

use super::bulk::{self, ChunkWriter, CopyInsert, WriteKind};
use super::cancel::CancelToken;
use super::copy::{self, CopyRecord, CopyRow};
use super::search;
use super::traits::{BulkWriter, Repository, Searcher, SoftDelete};
use crate::models::{self, Entity, Product, ProductSearchFilter, ProductSummary, SearchResult};
use crate::{Error, Result, Stage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use std::time::Instant;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, brand_id, name, sku, summary, storyline, stock_quantity, price, \
     deleted, created_by, created_at, updated_by, updated_at, deleted_by, deleted_at";

impl CopyRecord for Product {
    const TABLE: &'static str = "catalog.products";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "brand_id",
        "name",
        "sku",
        "summary",
        "storyline",
        "stock_quantity",
        "price",
        "deleted",
        "created_by",
        "created_at",
    ];

    fn write_fields(&self, row: &mut CopyRow<'_>) {
        row.field(&self.id)
            .field(&self.brand_id)
            .field(&self.name)
            .field(&self.sku)
            .field(&self.summary)
            .field(&self.storyline)
            .field(&self.stock_quantity)
            .field(&self.price)
            .field(&self.deleted)
            .field(&self.created_by)
            .field(&self.created_at);
    }
}

/// Updates a chunk of products with one `UPDATE ... FROM UNNEST(...)` statement.
pub struct ProductArrayUpdate;

#[async_trait]
impl ChunkWriter<Product> for ProductArrayUpdate {
    async fn write_chunk(
        &self,
        conn: &mut PgConnection,
        chunk: &[Product],
        stage: Stage,
    ) -> Result<u64> {
        let len = chunk.len();
        let mut ids: Vec<Uuid> = Vec::with_capacity(len);
        let mut brand_ids: Vec<i32> = Vec::with_capacity(len);
        let mut names: Vec<String> = Vec::with_capacity(len);
        let mut skus: Vec<Option<String>> = Vec::with_capacity(len);
        let mut summaries: Vec<Option<String>> = Vec::with_capacity(len);
        let mut storylines: Vec<Option<String>> = Vec::with_capacity(len);
        let mut stock: Vec<i32> = Vec::with_capacity(len);
        let mut prices: Vec<Decimal> = Vec::with_capacity(len);
        let mut updated_by: Vec<Option<Uuid>> = Vec::with_capacity(len);
        let mut updated_at: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(len);

        for product in chunk {
            ids.push(product.id);
            brand_ids.push(product.brand_id);
            names.push(product.name.clone());
            skus.push(product.sku.clone());
            summaries.push(product.summary.clone());
            storylines.push(product.storyline.clone());
            stock.push(product.stock_quantity);
            prices.push(product.price);
            updated_by.push(product.updated_by);
            updated_at.push(product.updated_at);
        }

        let result = sqlx::query(
            r#"
            UPDATE catalog.products AS p
            SET brand_id = data.brand_id,
                name = data.name,
                sku = data.sku,
                summary = data.summary,
                storyline = data.storyline,
                stock_quantity = data.stock_quantity,
                price = data.price,
                updated_by = data.updated_by,
                updated_at = data.updated_at
            FROM UNNEST(
                $1::uuid[], $2::int4[], $3::text[], $4::text[], $5::text[],
                $6::text[], $7::int4[], $8::numeric[], $9::uuid[], $10::timestamptz[]
            ) AS data(id, brand_id, name, sku, summary, storyline, stock_quantity, price, updated_by, updated_at)
            WHERE p.id = data.id AND p.deleted = FALSE
            "#,
        )
        .bind(ids)
        .bind(brand_ids)
        .bind(names)
        .bind(skus)
        .bind(summaries)
        .bind(storylines)
        .bind(stock)
        .bind(prices)
        .bind(updated_by)
        .bind(updated_at)
        .execute(conn)
        .await
        .map_err(|e| Error::store(stage, e))?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository<Product> for PostgresProductStore {
    async fn insert(&self, product: &mut Product) -> Result<()> {
        product.assign_id();

        sqlx::query(
            r#"
            INSERT INTO catalog.products
                (id, brand_id, name, sku, summary, storyline, stock_quantity, price,
                 deleted, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id)
        .bind(product.brand_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.summary)
        .bind(&product.storyline)
        .bind(product.stock_quantity)
        .bind(product.price)
        .bind(product.deleted)
        .bind(product.created_by)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Insert, e))?;

        tracing::debug!(product_id = %product.id, "Inserted product");
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<u64> {
        bulk::check_update_target(product)?;

        let result = sqlx::query(
            r#"
            UPDATE catalog.products
            SET brand_id = $2, name = $3, sku = $4, summary = $5, storyline = $6,
                stock_quantity = $7, price = $8, updated_by = $9, updated_at = $10
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(product.id)
        .bind(product.brand_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.summary)
        .bind(&product.storyline)
        .bind(product.stock_quantity)
        .bind(product.price)
        .bind(product.updated_by)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Update, e))?;

        Ok(result.rows_affected())
    }

    async fn upsert(&self, product: &mut Product) -> Result<()> {
        product.assign_id();

        sqlx::query(
            r#"
            INSERT INTO catalog.products
                (id, brand_id, name, sku, summary, storyline, stock_quantity, price,
                 deleted, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                brand_id = EXCLUDED.brand_id,
                name = EXCLUDED.name,
                sku = EXCLUDED.sku,
                summary = EXCLUDED.summary,
                storyline = EXCLUDED.storyline,
                stock_quantity = EXCLUDED.stock_quantity,
                price = EXCLUDED.price,
                updated_by = EXCLUDED.created_by,
                updated_at = EXCLUDED.created_at
            "#,
        )
        .bind(product.id)
        .bind(product.brand_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.summary)
        .bind(&product.storyline)
        .bind(product.stock_quantity)
        .bind(product.price)
        .bind(product.created_by)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Upsert, e))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM catalog.products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Delete, e))?;
        Ok(result.rows_affected())
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM catalog.products WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Delete, e))?;
        Ok(result.rows_affected())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog.products WHERE id = $1 AND deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Fetch, e))
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog.products \
             WHERE id = ANY($1) AND deleted = FALSE ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Fetch, e))
    }

    async fn get_all(&self) -> Result<Vec<Product>> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog.products WHERE deleted = FALSE ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Fetch, e))
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM catalog.products WHERE deleted = FALSE")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Count, e))
    }
}

#[async_trait]
impl SoftDelete<Product> for PostgresProductStore {
    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE catalog.products
            SET deleted = TRUE, deleted_by = $2, deleted_at = $3
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(models::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::SoftDelete, e))?;

        if result.rows_affected() > 0 {
            tracing::info!(product_id = %id, actor = %actor, "Soft deleted product");
        }
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BulkWriter<Product> for PostgresProductStore {
    async fn bulk_insert_one_shot(
        &self,
        items: &mut [Product],
        cancel: &CancelToken,
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        bulk::prepare_insert(items);
        let rows = cancel
            .guard(
                Stage::BulkCopy,
                copy::copy_rows_pooled(&self.pool, items, Stage::BulkCopy),
            )
            .await?;

        tracing::info!(
            entity = Product::KIND,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "One-shot bulk copy finished"
        );
        Ok(rows)
    }

    async fn bulk_insert(
        &self,
        items: &mut [Product],
        batch_size: usize,
        cancel: &CancelToken,
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        bulk::prepare_insert(items);
        bulk::write_in_chunks(
            &self.pool,
            &CopyInsert,
            items,
            batch_size,
            WriteKind::Insert,
            cancel,
        )
        .await
    }

    async fn bulk_update(
        &self,
        items: &mut [Product],
        batch_size: usize,
        cancel: &CancelToken,
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        bulk::prepare_update(items)?;
        bulk::write_in_chunks(
            &self.pool,
            &ProductArrayUpdate,
            items,
            batch_size,
            WriteKind::Update,
            cancel,
        )
        .await
    }
}

#[async_trait]
impl Searcher<ProductSearchFilter, ProductSummary> for PostgresProductStore {
    async fn search(&self, filter: &ProductSearchFilter) -> Result<SearchResult<ProductSummary>> {
        let total = search::product_count_query(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Count, e))?;

        if total == 0 {
            return Ok(SearchResult::empty());
        }

        let items = search::product_page_query(filter)
            .build_query_as::<ProductSummary>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::SearchPage, e))?;

        Ok(SearchResult { total, items })
    }
}
