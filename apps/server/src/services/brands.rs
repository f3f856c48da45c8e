//! Brand service

use super::{clean_text, require_actor, validate_batch, BulkOutcome, Limits};
use crate::config::{BulkConfig, SearchConfig};
use crate::db::{BrandStore, CancelToken};
use crate::models::{
    self, Brand, BrandInput, BrandSearchFilter, BrandSummary, Entity, SearchResult,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

pub struct BrandService {
    store: Arc<dyn BrandStore>,
    limits: Limits,
}

impl BrandService {
    pub fn new(store: Arc<dyn BrandStore>, bulk: &BulkConfig, search: &SearchConfig) -> Self {
        Self {
            store,
            limits: Limits::new(bulk, search),
        }
    }

    pub async fn create(&self, actor: Uuid, input: BrandInput) -> Result<Brand> {
        require_actor(actor)?;
        let mut brand = Brand::from_input(input, actor, models::now());
        brand.validate()?;

        self.store.insert(&mut brand).await?;
        tracing::info!(brand_id = brand.id, slug = %brand.slug, actor = %actor, "Created brand");
        Ok(brand)
    }

    pub async fn update(&self, actor: Uuid, id: i32, input: BrandInput) -> Result<Option<Brand>> {
        require_actor(actor)?;
        let brand = Brand::for_update(id, input, actor, models::now());
        brand.validate()?;

        if self.store.update(&brand).await? == 0 {
            return Ok(None);
        }
        self.store.get_by_id(id).await
    }

    pub async fn upsert(&self, actor: Uuid, input: BrandInput) -> Result<Brand> {
        require_actor(actor)?;
        let mut brand = Brand::from_input(input, actor, models::now());
        brand.validate()?;

        self.store.upsert(&mut brand).await?;
        let id = brand.id;
        Ok(self.store.get_by_id(id).await?.unwrap_or(brand))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Brand>> {
        self.store.get_by_id(id).await
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Brand>> {
        if ids.len() > self.limits.max_items {
            return Err(Error::InvalidInput(format!(
                "at most {} identifiers per lookup",
                self.limits.max_items
            )));
        }
        self.store.get_by_ids(ids).await
    }

    pub async fn get_all(&self) -> Result<Vec<Brand>> {
        self.store.get_all().await
    }

    pub async fn count(&self) -> Result<i64> {
        self.store.count().await
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        Ok(self.store.delete(id).await? > 0)
    }

    pub async fn delete_by_ids(&self, ids: &[i32]) -> Result<u64> {
        if ids.len() > self.limits.max_items {
            return Err(Error::InvalidInput(format!(
                "at most {} identifiers per delete",
                self.limits.max_items
            )));
        }
        self.store.delete_by_ids(ids).await
    }

    /// Insert a batch created by `actor`. Identifiers come from the store sequence
    /// and are not reported back for bulk loads.
    pub async fn bulk_insert(
        &self,
        actor: Uuid,
        inputs: Vec<BrandInput>,
        batch_size: Option<usize>,
        one_shot: bool,
        cancel: &CancelToken,
    ) -> Result<BulkOutcome<i32>> {
        require_actor(actor)?;
        self.limits.check_batch_len(inputs.len())?;
        let batch_size = self.limits.batch_size(batch_size)?;

        let now = models::now();
        let mut items: Vec<Brand> = inputs
            .into_iter()
            .map(|input| Brand::from_input(input, actor, now))
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
            entity = Brand::KIND,
            actor = %actor,
            items = items.len(),
            rows,
            one_shot,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bulk insert completed"
        );

        Ok(BulkOutcome {
            rows,
            ids: items.iter().filter(|b| b.has_id()).map(|b| b.id).collect(),
        })
    }

    pub async fn bulk_update(
        &self,
        actor: Uuid,
        inputs: Vec<BrandInput>,
        batch_size: Option<usize>,
        cancel: &CancelToken,
    ) -> Result<BulkOutcome<i32>> {
        require_actor(actor)?;
        self.limits.check_batch_len(inputs.len())?;
        let batch_size = self.limits.batch_size(batch_size)?;

        let now = models::now();
        let mut items = Vec::with_capacity(inputs.len());
        for (position, input) in inputs.into_iter().enumerate() {
            let id = input
                .id
                .filter(|id| *id > 0)
                .ok_or_else(|| Error::InvalidInput(format!("items[{position}]: id is required")))?;
            items.push(Brand::for_update(id, input, actor, now));
        }
        validate_batch(&items)?;

        let cancel = cancel.with_timeout(self.limits.bulk_timeout);
        let started = Instant::now();
        let rows = self
            .store
            .bulk_update(&mut items, batch_size, &cancel)
            .await?;

        tracing::info!(
            entity = Brand::KIND,
            actor = %actor,
            items = items.len(),
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bulk update completed"
        );

        Ok(BulkOutcome {
            rows,
            ids: items.iter().map(|b| b.id).collect(),
        })
    }

    pub async fn search(&self, filter: BrandSearchFilter) -> Result<SearchResult<BrandSummary>> {
        let limit = self
            .limits
            .page(filter.limit, filter.offset, filter.last_seen_id.is_some())?;

        let filter = BrandSearchFilter {
            name: clean_text(filter.name),
            q: clean_text(filter.q),
            limit: Some(limit),
            ..filter
        };
        self.store.search(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryCatalog;

    fn service() -> (BrandService, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let service = BrandService::new(
            catalog.clone(),
            &BulkConfig::default(),
            &SearchConfig::default(),
        );
        (service, catalog)
    }

    fn named(name: &str) -> BrandInput {
        BrandInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_gets_a_sequence_id() {
        let (service, _) = service();
        let actor = Uuid::new_v4();
        let first = service.create(actor, named("Nordic Home")).await.unwrap();
        let second = service.create(actor, named("Café Noir")).await.unwrap();

        assert_eq!(first.slug, "nordic-home");
        assert_eq!(second.slug, "cafe-noir");
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn duplicate_slugs_are_conflicts() {
        let (service, _) = service();
        let actor = Uuid::new_v4();
        service.create(actor, named("Acme")).await.unwrap();
        let err = service.create(actor, named("ACME")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn bulk_update_sets_the_audit_pair() {
        let (service, _) = service();
        let actor = Uuid::new_v4();
        let brand = service.create(actor, named("Old")).await.unwrap();

        let editor = Uuid::new_v4();
        let outcome = service
            .bulk_update(
                editor,
                vec![BrandInput {
                    id: Some(brand.id),
                    ..named("New")
                }],
                None,
                &CancelToken::none(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.rows, 1);

        let stored = service.get_by_id(brand.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "New");
        assert_eq!(stored.slug, "new");
        assert_eq!(stored.updated_by, Some(editor));
        assert!(stored.updated_at.is_some());
        assert_eq!(stored.created_by, actor);
    }

    #[tokio::test]
    async fn empty_bulk_is_invalid_input() {
        let (service, catalog) = service();
        let err = service
            .bulk_insert(Uuid::new_v4(), Vec::new(), None, false, &CancelToken::none())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(catalog.store_calls(), 0);
    }
}
