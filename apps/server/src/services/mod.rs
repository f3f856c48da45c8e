//! Business services: validation, audit stamping, and limits in front of the stores

pub mod brands;
pub mod products;

pub use brands::BrandService;
pub use products::ProductService;

use crate::config::{BulkConfig, SearchConfig};
use crate::{Error, Result};
use serde::Serialize;
use tokio::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// Result of a bulk call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome<Id> {
    pub rows: u64,
    /// Identifiers written, in the order they were sent to the store.
    /// Empty for store-assigned identifiers that a bulk load does not return.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<Id>,
}

/// Limits shared by both services.
#[derive(Debug, Clone)]
pub(crate) struct Limits {
    pub batch_size: usize,
    pub max_batch_size: usize,
    pub max_items: usize,
    pub bulk_timeout: Duration,
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Limits {
    pub fn new(bulk: &BulkConfig, search: &SearchConfig) -> Self {
        Self {
            batch_size: bulk.batch_size,
            max_batch_size: bulk.max_batch_size,
            max_items: bulk.max_items,
            bulk_timeout: Duration::from_secs(bulk.timeout_seconds),
            default_limit: search.default_limit,
            max_limit: search.max_limit,
        }
    }

    /// Batch size to hand to the store: the configured default when absent or `0`.
    pub fn batch_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None | Some(0) => Ok(self.batch_size),
            Some(size) if size > self.max_batch_size => Err(Error::InvalidInput(format!(
                "batch size {size} exceeds the maximum of {}",
                self.max_batch_size
            ))),
            Some(size) => Ok(size),
        }
    }

    pub fn check_batch_len(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::InvalidInput("bulk request has no items".to_string()));
        }
        if len > self.max_items {
            return Err(Error::InvalidInput(format!(
                "bulk request has {len} items, the maximum is {}",
                self.max_items
            )));
        }
        Ok(())
    }

    /// Resolve the page size and reject negative or oversized paging values.
    pub fn page(&self, limit: Option<i64>, offset: Option<i64>, has_cursor: bool) -> Result<i64> {
        let limit = match limit {
            Some(limit) if limit < 0 => {
                return Err(Error::InvalidInput("limit cannot be negative".to_string()))
            }
            None | Some(0) => self.default_limit,
            Some(limit) if limit > self.max_limit => {
                return Err(Error::InvalidInput(format!(
                    "limit cannot exceed {}",
                    self.max_limit
                )))
            }
            Some(limit) => limit,
        };
        match offset {
            Some(offset) if offset < 0 => {
                Err(Error::InvalidInput("offset cannot be negative".to_string()))
            }
            Some(offset) if offset > 0 && has_cursor => Err(Error::InvalidInput(
                "offset and lastSeenId cannot be combined".to_string(),
            )),
            _ => Ok(limit),
        }
    }
}

pub(crate) fn require_actor(actor: Uuid) -> Result<()> {
    if actor.is_nil() {
        return Err(Error::InvalidInput("acting user is required".to_string()));
    }
    Ok(())
}

/// Validate every item; the first failure is reported with its position.
pub(crate) fn validate_batch<T: Validate>(items: &[T]) -> Result<()> {
    for (position, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|e| Error::InvalidInput(format!("items[{position}]: {e}")))?;
    }
    Ok(())
}

/// Trim a search text field; blank becomes `None`.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    crate::models::trim_optional(value)
}
