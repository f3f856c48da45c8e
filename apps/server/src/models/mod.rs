//! Catalog entities and the parameter objects passed to the store

mod brand;
mod product;
mod search;
pub mod slug;

pub use brand::{Brand, BrandInput};
pub use product::{Product, ProductInput};
pub use search::{
    BrandSearchFilter, BrandSummary, ProductSearchFilter, ProductSummary, SearchResult,
};

use chrono::{DateTime, SubsecRound, Utc};
use std::{fmt, hash::Hash};
use uuid::Uuid;

/// Behaviour shared by every record kind the bulk engine writes.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Copy + Ord + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Human readable kind, used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    /// False until an identifier has been assigned (client side or by the store).
    fn has_id(&self) -> bool;

    /// Assign a client-side identifier when the kind uses one and none is set yet.
    fn assign_id(&mut self);

    fn stamp_created(&mut self, at: DateTime<Utc>);

    fn created_at(&self) -> DateTime<Utc>;

    /// `(updated_by, updated_at)`; both or neither are set.
    fn audit_pair(&self) -> (Option<Uuid>, Option<DateTime<Utc>>);
}

/// Current time at the precision the store keeps (microseconds), so a value
/// handed to the caller compares equal to the value read back.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Trim a required string in place.
pub(crate) fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Trim an optional string; blank values become `None`.
pub(crate) fn trim_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
