use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product search predicates plus the page cursor.
///
/// `total` of a search only reflects `name`, `brand_id` and `q`; the cursor
/// fields (`limit`, `offset`, `last_seen_id`) only shape the returned page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchFilter {
    pub name: Option<String>,
    pub brand_id: Option<i32>,
    /// Free text matched against name, sku and summary.
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub last_seen_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandSearchFilter {
    pub name: Option<String>,
    /// Free text matched against name and slug.
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub last_seen_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> SearchResult<T> {
    pub fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }
}

/// Row projection returned by product search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub brand_id: i32,
    pub brand_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BrandSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
}
