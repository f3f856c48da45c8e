use super::{trim_in_place, trim_optional, Entity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// A catalog product. Identifiers are time-ordered UUIDv7 assigned before the row is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[validate(range(min = 1, message = "brand id must be positive"))]
    pub brand_id: i32,
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    #[validate(length(max = 100, message = "sku must be at most 100 characters"))]
    pub sku: Option<String>,
    #[validate(length(max = 500, message = "summary must be at most 500 characters"))]
    pub summary: Option<String>,
    #[validate(length(max = 2000, message = "storyline must be at most 2000 characters"))]
    pub storyline: Option<String>,
    #[validate(range(min = 0, message = "stock quantity cannot be negative"))]
    pub stock_quantity: i32,
    #[validate(custom(function = "valid_price"))]
    pub price: Decimal,
    pub deleted: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Largest price the `NUMERIC(12, 2)` column holds.
pub const MAX_PRICE: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Prices are stored as `NUMERIC(12, 2)`; anything the column would reject or
/// round is refused here.
fn valid_price(price: &Decimal) -> Result<(), ValidationError> {
    let message = if price.is_sign_negative() && !price.is_zero() {
        "price cannot be negative"
    } else if *price > MAX_PRICE {
        "price must be at most 9999999999.99"
    } else if price.normalize().scale() > 2 {
        "price has at most 2 decimal places"
    } else {
        return Ok(());
    };
    let mut err = ValidationError::new("price");
    err.message = Some(message.into());
    Err(err)
}

/// Client-supplied product fields. Audit columns are never taken from the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub brand_id: i32,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub storyline: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub price: Decimal,
}

impl ProductInput {
    /// Trim text fields; blank optional fields are dropped.
    pub fn sanitize(mut self) -> Self {
        trim_in_place(&mut self.name);
        self.sku = trim_optional(self.sku);
        self.summary = trim_optional(self.summary);
        self.storyline = trim_optional(self.storyline);
        self
    }
}

impl Product {
    /// Build a new, not yet persisted product created by `actor` at `at`.
    pub fn from_input(input: ProductInput, actor: Uuid, at: DateTime<Utc>) -> Self {
        let input = input.sanitize();
        Self {
            id: input.id.unwrap_or(Uuid::nil()),
            brand_id: input.brand_id,
            name: input.name,
            sku: input.sku,
            summary: input.summary,
            storyline: input.storyline,
            stock_quantity: input.stock_quantity,
            price: input.price,
            deleted: false,
            created_by: actor,
            created_at: at,
            updated_by: None,
            updated_at: None,
            deleted_by: None,
            deleted_at: None,
        }
    }

    /// Build the replacement values for an existing product, stamped as updated by `actor`.
    pub fn for_update(id: Uuid, input: ProductInput, actor: Uuid, at: DateTime<Utc>) -> Self {
        let mut product = Self::from_input(ProductInput { id: Some(id), ..input }, actor, at);
        product.updated_by = Some(actor);
        product.updated_at = Some(at);
        product
    }
}

impl Entity for Product {
    type Id = Uuid;

    const KIND: &'static str = "Product";

    fn id(&self) -> Uuid {
        self.id
    }

    fn has_id(&self) -> bool {
        !self.id.is_nil()
    }

    fn assign_id(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::now_v7();
        }
    }

    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn audit_pair(&self) -> (Option<Uuid>, Option<DateTime<Utc>>) {
        (self.updated_by, self.updated_at)
    }
}
