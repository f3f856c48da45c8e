//! Product service

use super::{clean_text, require_actor, validate_batch, BulkOutcome, Limits};
use crate::config::{BulkConfig, SearchConfig};
use crate::db::{CancelToken, ProductStore};
use crate::models::{
    self, Entity, Product, ProductInput, ProductSearchFilter, ProductSummary, SearchResult,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

pub struct ProductService {
    store: Arc<dyn ProductStore>,
    limits: Limits,
}

impl ProductService {
    pub fn new(store: Arc<dyn ProductStore>, bulk: &BulkConfig, search: &SearchConfig) -> Self {
        Self {
            store,
            limits: Limits::new(bulk, search),
        }
    }

    pub async fn create(&self, actor: Uuid, input: ProductInput) -> Result<Product> {
        require_actor(actor)?;
        let mut product = Product::from_input(input, actor, models::now());
        product.validate()?;

        self.store.insert(&mut product).await?;
        tracing::info!(product_id = %product.id, actor = %actor, "Created product");
        Ok(product)
    }

    /// Replace a live product's fields. `None` when there is no such product.
    pub async fn update(
        &self,
        actor: Uuid,
        id: Uuid,
        input: ProductInput,
    ) -> Result<Option<Product>> {
        require_actor(actor)?;
        let product = Product::for_update(id, input, actor, models::now());
        product.validate()?;

        if self.store.update(&product).await? == 0 {
            return Ok(None);
        }
        self.store.get_by_id(id).await
    }

    /// Insert, or overwrite the business fields of an existing product.
    pub async fn upsert(&self, actor: Uuid, input: ProductInput) -> Result<Product> {
        require_actor(actor)?;
        let mut product = Product::from_input(input, actor, models::now());
        product.validate()?;

        self.store.upsert(&mut product).await?;
        let id = product.id;
        Ok(self.store.get_by_id(id).await?.unwrap_or(product))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        self.store.get_by_id(id).await
    }

    pub async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        if ids.len() > self.limits.max_items {
            return Err(Error::InvalidInput(format!(
                "at most {} identifiers per lookup",
                self.limits.max_items
            )));
        }
        self.store.get_by_ids(ids).await
    }

    pub async fn get_all(&self) -> Result<Vec<Product>> {
        self.store.get_all().await
    }

    pub async fn count(&self) -> Result<i64> {
        self.store.count().await
    }

    /// Physically remove a product. Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.store.delete(id).await? > 0)
    }

    pub async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.len() > self.limits.max_items {
            return Err(Error::InvalidInput(format!(
                "at most {} identifiers per delete",
                self.limits.max_items
            )));
        }
        self.store.delete_by_ids(ids).await
    }

    /// Flag a product deleted by `actor`. Returns whether a live row was flagged.
    pub async fn soft_delete(&self, actor: Uuid, id: Uuid) -> Result<bool> {
        require_actor(actor)?;
        Ok(self.store.soft_delete(id, actor).await? > 0)
    }

    /// Insert a batch created by `actor`.
    ///
    /// `one_shot` streams the whole batch in one load; otherwise it is written
    /// in chunks of `batch_size` inside one transaction.
    pub async fn bulk_insert(
        &self,
        actor: Uuid,
        inputs: Vec<ProductInput>,
        batch_size: Option<usize>,
        one_shot: bool,
        cancel: &CancelToken,
    ) -> Result<BulkOutcome<Uuid>> {
        require_actor(actor)?;
        self.limits.check_batch_len(inputs.len())?;
        let batch_size = self.limits.batch_size(batch_size)?;

        let now = models::now();
        let mut items: Vec<Product> = inputs
            .into_iter()
            .map(|input| Product::from_input(input, actor, now))
            .collect();
        validate_batch(&items)?;

        let cancel = cancel.with_timeout(self.limits.bulk_timeout);
        let started = Instant::now();
        let rows = if one_shot {
            self.store.bulk_insert_one_shot(&mut items, &cancel).await?
        } else {
            self.store
                .bulk_insert(&mut items, batch_size, &cancel)
                .await?
        };

        tracing::info!(
            entity = Product::KIND,
            actor = %actor,
            items = items.len(),
            rows,
            one_shot,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bulk insert completed"
        );

        Ok(BulkOutcome {
            rows,
            ids: items.iter().map(|p| p.id).collect(),
        })
    }

    /// Update a batch on behalf of `actor`. Every item needs an `id`.
    pub async fn bulk_update(
        &self,
        actor: Uuid,
        inputs: Vec<ProductInput>,
        batch_size: Option<usize>,
        cancel: &CancelToken,
    ) -> Result<BulkOutcome<Uuid>> {
        require_actor(actor)?;
        self.limits.check_batch_len(inputs.len())?;
        let batch_size = self.limits.batch_size(batch_size)?;

        let now = models::now();
        let mut items = Vec::with_capacity(inputs.len());
        for (position, input) in inputs.into_iter().enumerate() {
            let id = input
                .id
                .filter(|id| !id.is_nil())
                .ok_or_else(|| Error::InvalidInput(format!("items[{position}]: id is required")))?;
            items.push(Product::for_update(id, input, actor, now));
        }
        validate_batch(&items)?;

        let cancel = cancel.with_timeout(self.limits.bulk_timeout);
        let started = Instant::now();
        let rows = self
            .store
            .bulk_update(&mut items, batch_size, &cancel)
            .await?;

        tracing::info!(
            entity = Product::KIND,
            actor = %actor,
            items = items.len(),
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bulk update completed"
        );

        Ok(BulkOutcome {
            rows,
            ids: items.iter().map(|p| p.id).collect(),
        })
    }

    pub async fn search(
        &self,
        filter: ProductSearchFilter,
    ) -> Result<SearchResult<ProductSummary>> {
        let limit = self
            .limits
            .page(filter.limit, filter.offset, filter.last_seen_id.is_some())?;
        if filter.brand_id.is_some_and(|id| id <= 0) {
            return Err(Error::InvalidInput("brandId must be positive".to_string()));
        }

        let filter = ProductSearchFilter {
            name: clean_text(filter.name),
            q: clean_text(filter.q),
            limit: Some(limit),
            ..filter
        };
        self.store.search(&filter).await
    }
}
