//! In-process catalog store
//!
//! Owned state behind one async mutex, constructed per test or per embedded
//! use. Bulk writes apply chunks to a staged copy of the tables and swap it in
//! only after the last chunk succeeds, so a failing chunk leaves nothing behind.
//! Constraint checks mirror the SQL schema (primary keys, unique brand slug,
//! product -> brand reference) and report the same SQLSTATE codes.

use super::bulk::{self, WriteKind};
use super::cancel::CancelToken;
use super::chunk::{chunks, ChunkSpan};
use super::search::effective_limit;
use super::traits::{BulkWriter, Repository, Searcher, SoftDelete};
use crate::models::{
    self, Brand, BrandSearchFilter, BrandSummary, Entity, Product, ProductSearchFilter,
    ProductSummary, SearchResult,
};
use crate::{Error, Result, Stage};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<Uuid, Product>,
    brands: BTreeMap<i32, Brand>,
    last_brand_id: i32,
}

impl Tables {
    fn insert_product(&mut self, product: &Product, stage: Stage) -> Result<()> {
        if self.products.contains_key(&product.id) {
            return Err(conflict(
                stage,
                UNIQUE_VIOLATION,
                "products_pkey",
                format!("duplicate key value (id)=({})", product.id),
            ));
        }
        self.check_brand_reference(product.brand_id, stage)?;
        self.products.insert(product.id, product.clone());
        Ok(())
    }

    fn check_brand_reference(&self, brand_id: i32, stage: Stage) -> Result<()> {
        if !self.brands.contains_key(&brand_id) {
            return Err(conflict(
                stage,
                FOREIGN_KEY_VIOLATION,
                "products_brand_id_fkey",
                format!("brand {brand_id} is not present in table \"brands\""),
            ));
        }
        Ok(())
    }

    fn check_slug_free(&self, slug: &str, owner: Option<i32>, stage: Stage) -> Result<()> {
        let taken = self
            .brands
            .values()
            .any(|b| b.slug == slug && Some(b.id) != owner);
        if taken {
            return Err(conflict(
                stage,
                UNIQUE_VIOLATION,
                "brands_slug_key",
                format!("duplicate key value (slug)=({slug})"),
            ));
        }
        Ok(())
    }

    fn insert_brand(&mut self, brand: &mut Brand, stage: Stage) -> Result<()> {
        self.check_slug_free(&brand.slug, None, stage)?;
        if !brand.has_id() {
            self.last_brand_id += 1;
            brand.id = self.last_brand_id;
        } else if self.brands.contains_key(&brand.id) {
            return Err(conflict(
                stage,
                UNIQUE_VIOLATION,
                "brands_pkey",
                format!("duplicate key value (id)=({})", brand.id),
            ));
        }
        self.brands.insert(brand.id, brand.clone());
        Ok(())
    }

    /// Apply one product update. Returns rows affected.
    fn update_product(&mut self, product: &Product, stage: Stage) -> Result<u64> {
        let brand_known = self.brands.contains_key(&product.brand_id);
        match self.products.get_mut(&product.id) {
            Some(row) if !row.deleted => {
                if !brand_known {
                    return Err(conflict(
                        stage,
                        FOREIGN_KEY_VIOLATION,
                        "products_brand_id_fkey",
                        format!("brand {} is not present", product.brand_id),
                    ));
                }
                row.brand_id = product.brand_id;
                row.name = product.name.clone();
                row.sku = product.sku.clone();
                row.summary = product.summary.clone();
                row.storyline = product.storyline.clone();
                row.stock_quantity = product.stock_quantity;
                row.price = product.price;
                row.updated_by = product.updated_by;
                row.updated_at = product.updated_at;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn update_brand(&mut self, brand: &Brand, stage: Stage) -> Result<u64> {
        if !self.brands.contains_key(&brand.id) {
            return Ok(0);
        }
        self.check_slug_free(&brand.slug, Some(brand.id), stage)?;
        if let Some(row) = self.brands.get_mut(&brand.id) {
            row.name = brand.name.clone();
            row.slug = brand.slug.clone();
            row.logo = brand.logo.clone();
            row.updated_by = brand.updated_by;
            row.updated_at = brand.updated_at;
        }
        Ok(1)
    }

    fn delete_brand(&mut self, id: i32, stage: Stage) -> Result<u64> {
        if !self.brands.contains_key(&id) {
            return Ok(0);
        }
        if self.products.values().any(|p| p.brand_id == id) {
            return Err(conflict(
                stage,
                FOREIGN_KEY_VIOLATION,
                "products_brand_id_fkey",
                format!("brand {id} is still referenced from table \"products\""),
            ));
        }
        self.brands.remove(&id);
        Ok(1)
    }
}

fn conflict(stage: Stage, code: &str, constraint: &str, message: String) -> Error {
    Error::Conflict {
        stage,
        code: code.to_string(),
        constraint: Some(constraint.to_string()),
        message,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Keyset/offset paging over rows already sorted by descending identifier.
fn page<T, Id: PartialOrd>(
    rows: Vec<T>,
    id: impl Fn(&T) -> Id,
    last_seen: Option<Id>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Vec<T> {
    let skip = offset.filter(|o| *o > 0).unwrap_or(0) as usize;
    let take = effective_limit(limit) as usize;
    rows.into_iter()
        .filter(|row| match &last_seen {
            Some(last) => id(row) < *last,
            None => true,
        })
        .skip(skip)
        .take(take)
        .collect()
}

#[derive(Debug, Default)]
struct Failures {
    products: HashSet<Uuid>,
    brand_slugs: HashSet<String>,
}

/// Store backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: Mutex<Tables>,
    store_calls: AtomicU64,
    transactions: AtomicU64,
    product_lock_order: Mutex<Vec<Vec<Uuid>>>,
    brand_lock_order: Mutex<Vec<Vec<i32>>>,
    failures: Mutex<Failures>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store operations that reached the tables.
    pub fn store_calls(&self) -> u64 {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Bulk transactions opened so far.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Identifier order in which each bulk product update touched its rows.
    pub async fn product_update_order(&self) -> Vec<Vec<Uuid>> {
        self.product_lock_order.lock().await.clone()
    }

    pub async fn brand_update_order(&self) -> Vec<Vec<i32>> {
        self.brand_lock_order.lock().await.clone()
    }

    /// Make any write touching this product fail with a check violation.
    pub async fn fail_product(&self, id: Uuid) {
        self.failures.lock().await.products.insert(id);
    }

    /// Make any write touching a brand with this slug fail with a check violation.
    pub async fn fail_brand_slug(&self, slug: &str) {
        self.failures.lock().await.brand_slugs.insert(slug.to_string());
    }

    /// Raw row lookup that also sees soft-deleted products.
    pub async fn raw_product(&self, id: Uuid) -> Option<Product> {
        self.tables.lock().await.products.get(&id).cloned()
    }

    fn touch(&self) {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn begin(&self) {
        self.transactions.fetch_add(1, Ordering::SeqCst);
    }

    async fn product_fault(&self, chunk: &[Product], stage: Stage) -> Result<()> {
        let failures = self.failures.lock().await;
        match chunk.iter().find(|p| failures.products.contains(&p.id)) {
            Some(p) => Err(conflict(
                stage,
                CHECK_VIOLATION,
                "injected_failure",
                format!("injected failure for product {}", p.id),
            )),
            None => Ok(()),
        }
    }

    async fn brand_fault(&self, chunk: &[Brand], stage: Stage) -> Result<()> {
        let failures = self.failures.lock().await;
        match chunk.iter().find(|b| failures.brand_slugs.contains(&b.slug)) {
            Some(b) => Err(conflict(
                stage,
                CHECK_VIOLATION,
                "injected_failure",
                format!("injected failure for brand {}", b.slug),
            )),
            None => Ok(()),
        }
    }

    /// Apply `items` chunk by chunk to a staged copy of the tables and swap it
    /// in once every chunk succeeded. Returns rows affected and the identifier
    /// order in which rows were touched.
    async fn stage_products<S, F>(
        &self,
        items: &[Product],
        batch_size: usize,
        stage_for: S,
        cancel: &CancelToken,
        mut apply: F,
    ) -> Result<(u64, Vec<Uuid>)>
    where
        S: Fn(ChunkSpan) -> Stage,
        F: FnMut(&mut Tables, &Product, Stage) -> Result<u64>,
    {
        self.touch();
        let mut tables = cancel
            .guard(Stage::BeginTransaction, async {
                Ok(self.tables.lock().await)
            })
            .await?;
        self.begin();

        let mut staged = tables.clone();
        let mut total = 0;
        let mut order = Vec::with_capacity(items.len());
        for (span, chunk) in chunks(items, batch_size) {
            let stage = stage_for(span);
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { stage });
            }
            self.product_fault(chunk, stage).await?;
            for product in chunk {
                order.push(product.id);
                total += apply(&mut staged, product, stage)?;
            }
            tokio::task::yield_now().await;
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: Stage::Commit,
            });
        }

        *tables = staged;
        Ok((total, order))
    }

    async fn stage_brands<S, F>(
        &self,
        items: &mut [Brand],
        batch_size: usize,
        stage_for: S,
        cancel: &CancelToken,
        mut apply: F,
    ) -> Result<(u64, Vec<i32>)>
    where
        S: Fn(ChunkSpan) -> Stage,
        F: FnMut(&mut Tables, &mut Brand, Stage) -> Result<u64>,
    {
        self.touch();
        let mut tables = cancel
            .guard(Stage::BeginTransaction, async {
                Ok(self.tables.lock().await)
            })
            .await?;
        self.begin();

        let mut staged = tables.clone();
        let mut total = 0;
        let mut order = Vec::with_capacity(items.len());
        let spans: Vec<ChunkSpan> = chunks(items, batch_size).map(|(span, _)| span).collect();
        for span in spans {
            let stage = stage_for(span);
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { stage });
            }
            let chunk = &mut items[span.offset..span.offset + span.len];
            self.brand_fault(chunk, stage).await?;
            for brand in chunk.iter_mut() {
                total += apply(&mut staged, brand, stage)?;
                order.push(brand.id);
            }
            tokio::task::yield_now().await;
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: Stage::Commit,
            });
        }

        *tables = staged;
        Ok((total, order))
    }
}

#[async_trait]
impl Repository<Product> for InMemoryCatalog {
    async fn insert(&self, product: &mut Product) -> Result<()> {
        self.touch();
        product.assign_id();
        self.product_fault(std::slice::from_ref(&*product), Stage::Insert)
            .await?;
        self.tables
            .lock()
            .await
            .insert_product(product, Stage::Insert)
    }

    async fn update(&self, product: &Product) -> Result<u64> {
        bulk::check_update_target(product)?;
        self.touch();
        self.product_fault(std::slice::from_ref(product), Stage::Update)
            .await?;
        self.tables
            .lock()
            .await
            .update_product(product, Stage::Update)
    }

    async fn upsert(&self, product: &mut Product) -> Result<()> {
        self.touch();
        product.assign_id();
        let mut tables = self.tables.lock().await;
        if tables.products.contains_key(&product.id) {
            let mut replacement = product.clone();
            replacement.updated_by = Some(product.created_by);
            replacement.updated_at = Some(product.created_at);
            tables.check_brand_reference(product.brand_id, Stage::Upsert)?;
            // Upsert also rewrites soft-deleted rows, as ON CONFLICT does.
            if let Some(row) = tables.products.get_mut(&product.id) {
                let deleted = (row.deleted, row.deleted_by, row.deleted_at);
                let created = (row.created_by, row.created_at);
                *row = replacement;
                (row.deleted, row.deleted_by, row.deleted_at) = deleted;
                (row.created_by, row.created_at) = created;
            }
            Ok(())
        } else {
            tables.insert_product(product, Stage::Upsert)
        }
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        self.touch();
        Ok(self.tables.lock().await.products.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.touch();
        let mut tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|id| tables.products.remove(*id).is_some())
            .count() as u64)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        self.touch();
        Ok(self
            .tables
            .lock()
            .await
            .products
            .get(&id)
            .filter(|p| !p.deleted)
            .cloned())
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.touch();
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .filter(|p| !p.deleted && wanted.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Product>> {
        self.touch();
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .rev()
            .filter(|p| !p.deleted)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        self.touch();
        let tables = self.tables.lock().await;
        Ok(tables.products.values().filter(|p| !p.deleted).count() as i64)
    }
}

#[async_trait]
impl SoftDelete<Product> for InMemoryCatalog {
    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> Result<u64> {
        self.touch();
        let mut tables = self.tables.lock().await;
        match tables.products.get_mut(&id) {
            Some(row) if !row.deleted => {
                row.deleted = true;
                row.deleted_by = Some(actor);
                row.deleted_at = Some(models::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl BulkWriter<Product> for InMemoryCatalog {
    async fn bulk_insert_one_shot(
        &self,
        items: &mut [Product],
        cancel: &CancelToken,
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        bulk::prepare_insert(items);
        // A single load behaves like one chunk spanning the whole batch.
        let (rows, _) = self
            .stage_products(
                items,
                items.len(),
                |_| Stage::BulkCopy,
                cancel,
                |tables, product, stage| tables.insert_product(product, stage).map(|_| 1),
            )
            .await?;
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
        let (rows, _) = self
            .stage_products(
                items,
                batch_size,
                |span| WriteKind::Insert.stage(span),
                cancel,
                |tables, product, stage| tables.insert_product(product, stage).map(|_| 1),
            )
            .await?;
        Ok(rows)
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
        let (rows, order) = self
            .stage_products(
                items,
                batch_size,
                |span| WriteKind::Update.stage(span),
                cancel,
                |tables, product, stage| tables.update_product(product, stage),
            )
            .await?;
        self.product_lock_order.lock().await.push(order);
        Ok(rows)
    }
}

#[async_trait]
impl Searcher<ProductSearchFilter, ProductSummary> for InMemoryCatalog {
    async fn search(&self, filter: &ProductSearchFilter) -> Result<SearchResult<ProductSummary>> {
        self.touch();
        let tables = self.tables.lock().await;
        let name = non_blank(&filter.name);
        let q = non_blank(&filter.q);

        let matching: Vec<&Product> = tables
            .products
            .values()
            .rev()
            .filter(|p| !p.deleted)
            .filter(|p| filter.brand_id.map_or(true, |b| p.brand_id == b))
            .filter(|p| name.map_or(true, |n| contains_ci(&p.name, n)))
            .filter(|p| {
                q.map_or(true, |q| {
                    contains_ci(&p.name, q)
                        || p.sku.as_deref().is_some_and(|s| contains_ci(s, q))
                        || p.summary.as_deref().is_some_and(|s| contains_ci(s, q))
                })
            })
            .collect();

        let total = matching.len() as i64;
        if total == 0 {
            return Ok(SearchResult::empty());
        }

        let rows = page(
            matching,
            |p| p.id,
            filter.last_seen_id,
            filter.limit,
            filter.offset,
        );
        let items = rows
            .into_iter()
            .filter_map(|p| {
                tables.brands.get(&p.brand_id).map(|b| ProductSummary {
                    id: p.id,
                    name: p.name.clone(),
                    price: p.price,
                    brand_id: p.brand_id,
                    brand_name: b.name.clone(),
                })
            })
            .collect();

        Ok(SearchResult { total, items })
    }
}

#[async_trait]
impl Repository<Brand> for InMemoryCatalog {
    async fn insert(&self, brand: &mut Brand) -> Result<()> {
        self.touch();
        self.brand_fault(std::slice::from_ref(&*brand), Stage::Insert)
            .await?;
        self.tables.lock().await.insert_brand(brand, Stage::Insert)
    }

    async fn update(&self, brand: &Brand) -> Result<u64> {
        bulk::check_update_target(brand)?;
        self.touch();
        self.brand_fault(std::slice::from_ref(brand), Stage::Update)
            .await?;
        self.tables.lock().await.update_brand(brand, Stage::Update)
    }

    async fn upsert(&self, brand: &mut Brand) -> Result<()> {
        if !brand.has_id() {
            return Repository::<Brand>::insert(self, brand).await;
        }
        self.touch();
        let mut tables = self.tables.lock().await;
        if tables.brands.contains_key(&brand.id) {
            let mut replacement = brand.clone();
            replacement.updated_by = Some(brand.created_by);
            replacement.updated_at = Some(brand.created_at);
            tables.update_brand(&replacement, Stage::Upsert).map(|_| ())
        } else {
            tables.insert_brand(brand, Stage::Upsert)
        }
    }

    async fn delete(&self, id: i32) -> Result<u64> {
        self.touch();
        self.tables.lock().await.delete_brand(id, Stage::Delete)
    }

    async fn delete_by_ids(&self, ids: &[i32]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.touch();
        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();
        let mut removed = 0;
        for id in ids.iter().collect::<HashSet<_>>() {
            removed += staged.delete_brand(*id, Stage::Delete)?;
        }
        *tables = staged;
        Ok(removed)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<Brand>> {
        self.touch();
        Ok(self.tables.lock().await.brands.get(&id).cloned())
    }

    async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Brand>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.touch();
        let wanted: HashSet<&i32> = ids.iter().collect();
        let tables = self.tables.lock().await;
        Ok(tables
            .brands
            .values()
            .filter(|b| wanted.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Brand>> {
        self.touch();
        Ok(self.tables.lock().await.brands.values().rev().cloned().collect())
    }

    async fn count(&self) -> Result<i64> {
        self.touch();
        Ok(self.tables.lock().await.brands.len() as i64)
    }
}

#[async_trait]
impl BulkWriter<Brand> for InMemoryCatalog {
    async fn bulk_insert_one_shot(&self, items: &mut [Brand], cancel: &CancelToken) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        bulk::prepare_insert(items);
        let len = items.len();
        let (rows, _) = self
            .stage_brands(
                items,
                len,
                |_| Stage::BulkCopy,
                cancel,
                |tables, brand, stage| tables.insert_brand(brand, stage).map(|_| 1),
            )
            .await?;
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
        let (rows, _) = self
            .stage_brands(
                items,
                batch_size,
                |span| WriteKind::Insert.stage(span),
                cancel,
                |tables, brand, stage| tables.insert_brand(brand, stage).map(|_| 1),
            )
            .await?;
        Ok(rows)
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
        let (rows, order) = self
            .stage_brands(
                items,
                batch_size,
                |span| WriteKind::Update.stage(span),
                cancel,
                |tables, brand, stage| tables.update_brand(brand, stage),
            )
            .await?;
        self.brand_lock_order.lock().await.push(order);
        Ok(rows)
    }
}

#[async_trait]
impl Searcher<BrandSearchFilter, BrandSummary> for InMemoryCatalog {
    async fn search(&self, filter: &BrandSearchFilter) -> Result<SearchResult<BrandSummary>> {
        self.touch();
        let tables = self.tables.lock().await;
        let name = non_blank(&filter.name);
        let q = non_blank(&filter.q);

        let matching: Vec<&Brand> = tables
            .brands
            .values()
            .rev()
            .filter(|b| name.map_or(true, |n| contains_ci(&b.name, n)))
            .filter(|b| q.map_or(true, |q| contains_ci(&b.name, q) || contains_ci(&b.slug, q)))
            .collect();

        let total = matching.len() as i64;
        if total == 0 {
            return Ok(SearchResult::empty());
        }

        let items = page(
            matching,
            |b| b.id,
            filter.last_seen_id,
            filter.limit,
            filter.offset,
        )
        .into_iter()
        .map(|b| BrandSummary {
            id: b.id,
            name: b.name.clone(),
            slug: b.slug.clone(),
            logo: b.logo.clone(),
        })
        .collect();

        Ok(SearchResult { total, items })
    }
}
