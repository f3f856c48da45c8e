//! Store capability traits
//!
//! Backends implement these per entity kind; services only see the composed
//! [`ProductStore`] / [`BrandStore`] trait objects.

use super::cancel::CancelToken;
use crate::models::{
    Brand, BrandSearchFilter, BrandSummary, Entity, Product, ProductSearchFilter, ProductSummary,
    SearchResult,
};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Single-row CRUD. Reads never return soft-deleted rows.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Insert one row. Products get a UUIDv7 when they have none; brands get the
    /// sequence value written back into `entity.id`.
    async fn insert(&self, entity: &mut E) -> Result<()>;

    /// Replace the business fields and the update audit pair. Returns rows affected.
    async fn update(&self, entity: &E) -> Result<u64>;

    /// Insert, or update the business fields when the identifier already exists.
    /// On the update path the row's audit pair is set from the entity's creator.
    async fn upsert(&self, entity: &mut E) -> Result<()>;

    async fn delete(&self, id: E::Id) -> Result<u64>;

    async fn delete_by_ids(&self, ids: &[E::Id]) -> Result<u64>;

    /// `None` when no live row has this identifier.
    async fn get_by_id(&self, id: E::Id) -> Result<Option<E>>;

    async fn get_by_ids(&self, ids: &[E::Id]) -> Result<Vec<E>>;

    async fn get_all(&self) -> Result<Vec<E>>;

    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait SoftDelete<E: Entity>: Send + Sync {
    /// Flag the row deleted by `actor`. Returns rows affected (0 if absent or already deleted).
    async fn soft_delete(&self, id: E::Id, actor: Uuid) -> Result<u64>;
}

/// Set-oriented writes. Empty input returns `Ok(0)` without touching the store.
#[async_trait]
pub trait BulkWriter<E: Entity>: Send + Sync {
    /// Load every item in one streaming operation.
    async fn bulk_insert_one_shot(&self, items: &mut [E], cancel: &CancelToken) -> Result<u64>;

    /// Load in chunks of `batch_size` (0 = default) inside one transaction.
    async fn bulk_insert(
        &self,
        items: &mut [E],
        batch_size: usize,
        cancel: &CancelToken,
    ) -> Result<u64>;

    /// Sort by identifier, then update in chunks of `batch_size` inside one transaction.
    async fn bulk_update(
        &self,
        items: &mut [E],
        batch_size: usize,
        cancel: &CancelToken,
    ) -> Result<u64>;
}

#[async_trait]
pub trait Searcher<F, T>: Send + Sync
where
    F: Sync,
{
    async fn search(&self, filter: &F) -> Result<SearchResult<T>>;
}

pub trait ProductStore:
    Repository<Product>
    + SoftDelete<Product>
    + BulkWriter<Product>
    + Searcher<ProductSearchFilter, ProductSummary>
{
}

impl<T> ProductStore for T where
    T: Repository<Product>
        + SoftDelete<Product>
        + BulkWriter<Product>
        + Searcher<ProductSearchFilter, ProductSummary>
{
}

pub trait BrandStore:
    Repository<Brand> + BulkWriter<Brand> + Searcher<BrandSearchFilter, BrandSummary>
{
}

impl<T> BrandStore for T where
    T: Repository<Brand> + BulkWriter<Brand> + Searcher<BrandSearchFilter, BrandSummary>
{
}
