//! PostgreSQL brand store

use super::bulk::{self, ChunkWriter, CopyInsert, WriteKind};
use super::cancel::CancelToken;
use super::copy::{self, CopyRecord, CopyRow};
use super::search;
use super::traits::{BulkWriter, Repository, Searcher};
use crate::models::{Brand, BrandSearchFilter, BrandSummary, Entity, SearchResult};
use crate::{Error, Result, Stage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use std::time::Instant;
use uuid::Uuid;

const SELECT_COLUMNS: &str =
    "id, name, slug, logo, created_by, created_at, updated_by, updated_at";

// The identifier column is left to the sequence.
impl CopyRecord for Brand {
    const TABLE: &'static str = "catalog.brands";
    const COLUMNS: &'static [&'static str] = &["name", "slug", "logo", "created_by", "created_at"];

    fn write_fields(&self, row: &mut CopyRow<'_>) {
        row.field(&self.name)
            .field(&self.slug)
            .field(&self.logo)
            .field(&self.created_by)
            .field(&self.created_at);
    }
}

pub struct BrandArrayUpdate;

#[async_trait]
impl ChunkWriter<Brand> for BrandArrayUpdate {
    async fn write_chunk(
        &self,
        conn: &mut PgConnection,
        chunk: &[Brand],
        stage: Stage,
    ) -> Result<u64> {
        let len = chunk.len();
        let mut ids: Vec<i32> = Vec::with_capacity(len);
        let mut names: Vec<String> = Vec::with_capacity(len);
        let mut slugs: Vec<String> = Vec::with_capacity(len);
        let mut logos: Vec<Option<String>> = Vec::with_capacity(len);
        let mut updated_by: Vec<Option<Uuid>> = Vec::with_capacity(len);
        let mut updated_at: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(len);

        for brand in chunk {
            ids.push(brand.id);
            names.push(brand.name.clone());
            slugs.push(brand.slug.clone());
            logos.push(brand.logo.clone());
            updated_by.push(brand.updated_by);
            updated_at.push(brand.updated_at);
        }

        let result = sqlx::query(
            r#"
            UPDATE catalog.brands AS b
            SET name = data.name,
                slug = data.slug,
                logo = data.logo,
                updated_by = data.updated_by,
                updated_at = data.updated_at
            FROM UNNEST($1::int4[], $2::text[], $3::text[], $4::text[], $5::uuid[], $6::timestamptz[])
                AS data(id, name, slug, logo, updated_by, updated_at)
            WHERE b.id = data.id
            "#,
        )
        .bind(ids)
        .bind(names)
        .bind(slugs)
        .bind(logos)
        .bind(updated_by)
        .bind(updated_at)
        .execute(conn)
        .await
        .map_err(|e| Error::store(stage, e))?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PostgresBrandStore {
    pool: PgPool,
}

impl PostgresBrandStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Brand> for PostgresBrandStore {
    async fn insert(&self, brand: &mut Brand) -> Result<()> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO catalog.brands (name, slug, logo, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&brand.name)
        .bind(&brand.slug)
        .bind(&brand.logo)
        .bind(brand.created_by)
        .bind(brand.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Insert, e))?;

        brand.id = id;
        tracing::debug!(brand_id = id, slug = %brand.slug, "Inserted brand");
        Ok(())
    }

    async fn update(&self, brand: &Brand) -> Result<u64> {
        bulk::check_update_target(brand)?;

        let result = sqlx::query(
            r#"
            UPDATE catalog.brands
            SET name = $2, slug = $3, logo = $4, updated_by = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(brand.id)
        .bind(&brand.name)
        .bind(&brand.slug)
        .bind(&brand.logo)
        .bind(brand.updated_by)
        .bind(brand.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Update, e))?;

        Ok(result.rows_affected())
    }

    async fn upsert(&self, brand: &mut Brand) -> Result<()> {
        // Without an identifier there is nothing to conflict on.
        if !brand.has_id() {
            return self.insert(brand).await;
        }

        sqlx::query(
            r#"
            INSERT INTO catalog.brands (id, name, slug, logo, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                slug = EXCLUDED.slug,
                logo = EXCLUDED.logo,
                updated_by = EXCLUDED.created_by,
                updated_at = EXCLUDED.created_at
            "#,
        )
        .bind(brand.id)
        .bind(&brand.name)
        .bind(&brand.slug)
        .bind(&brand.logo)
        .bind(brand.created_by)
        .bind(brand.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Upsert, e))?;

        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM catalog.brands WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Delete, e))?;
        Ok(result.rows_affected())
    }

    async fn delete_by_ids(&self, ids: &[i32]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM catalog.brands WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Delete, e))?;
        Ok(result.rows_affected())
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<Brand>> {
        sqlx::query_as::<_, Brand>(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog.brands WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Fetch, e))
    }

    async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Brand>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Brand>(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog.brands WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Fetch, e))
    }

    async fn get_all(&self) -> Result<Vec<Brand>> {
        sqlx::query_as::<_, Brand>(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog.brands ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::store(Stage::Fetch, e))
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM catalog.brands")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Count, e))
    }
}

#[async_trait]
impl BulkWriter<Brand> for PostgresBrandStore {
    async fn bulk_insert_one_shot(&self, items: &mut [Brand], cancel: &CancelToken) -> Result<u64> {
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
            entity = Brand::KIND,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "One-shot bulk copy finished"
        );
        Ok(rows)
    }

    async fn bulk_insert(
        &self,
        items: &mut [Brand],
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
        items: &mut [Brand],
        batch_size: usize,
        cancel: &CancelToken,
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        bulk::prepare_update(items)?;
        bulk::write_in_chunks(
            &self.pool,
            &BrandArrayUpdate,
            items,
            batch_size,
            WriteKind::Update,
            cancel,
        )
        .await
    }
}

#[async_trait]
impl Searcher<BrandSearchFilter, BrandSummary> for PostgresBrandStore {
    async fn search(&self, filter: &BrandSearchFilter) -> Result<SearchResult<BrandSummary>> {
        let total = search::brand_count_query(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::Count, e))?;

        if total == 0 {
            return Ok(SearchResult::empty());
        }

        let items = search::brand_page_query(filter)
            .build_query_as::<BrandSummary>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::store(Stage::SearchPage, e))?;

        Ok(SearchResult { total, items })
    }
}
