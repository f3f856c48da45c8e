pub mod brands;
pub mod health;
pub mod products;

use serde::Deserialize;

/// Body of `POST .../bulk`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInsertRequest<T> {
    pub items: Vec<T>,
    /// Rows per chunk; absent or `0` uses the configured default.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Stream the whole batch as one load instead of chunking.
    #[serde(default)]
    pub one_shot: bool,
}

/// Body of `PUT .../bulk`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest<Id> {
    pub ids: Vec<Id>,
}
