use super::{slug::slugify, trim_in_place, trim_optional, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A brand. The identifier comes from the store sequence; `0` means "not yet stored".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: i32,
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "slug must be 1 to 255 characters"))]
    pub slug: String,
    pub logo: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandInput {
    #[serde(default)]
    pub id: Option<i32>,
    pub name: String,
    /// Derived from the name when absent or blank.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl BrandInput {
    pub fn sanitize(mut self) -> Self {
        trim_in_place(&mut self.name);
        self.logo = trim_optional(self.logo);
        self.slug = match trim_optional(self.slug) {
            Some(slug) => Some(slugify(&slug)),
            None => Some(slugify(&self.name)),
        };
        self
    }
}

impl Brand {
    pub fn from_input(input: BrandInput, actor: Uuid, at: DateTime<Utc>) -> Self {
        let input = input.sanitize();
        Self {
            id: input.id.unwrap_or(0),
            name: input.name,
            slug: input.slug.unwrap_or_default(),
            logo: input.logo,
            created_by: actor,
            created_at: at,
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn for_update(id: i32, input: BrandInput, actor: Uuid, at: DateTime<Utc>) -> Self {
        let mut brand = Self::from_input(BrandInput { id: Some(id), ..input }, actor, at);
        brand.updated_by = Some(actor);
        brand.updated_at = Some(at);
        brand
    }
}

impl Entity for Brand {
    type Id = i32;

    const KIND: &'static str = "Brand";

    fn id(&self) -> i32 {
        self.id
    }

    fn has_id(&self) -> bool {
        self.id > 0
    }

    // Brand identifiers come from the store sequence.
    fn assign_id(&mut self) {}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_derived_from_the_name_when_missing() {
        let brand = Brand::from_input(
            BrandInput {
                name: "  Işık Mobilya  ".to_string(),
                ..Default::default()
            },
            Uuid::new_v4(),
            super::super::now(),
        );
        assert_eq!(brand.name, "Işık Mobilya");
        assert_eq!(brand.slug, "isik-mobilya");
        assert!(!brand.has_id());
    }

    #[test]
    fn explicit_slugs_are_normalised() {
        let brand = Brand::from_input(
            BrandInput {
                name: "Acme".to_string(),
                slug: Some("Acme Home & Garden".to_string()),
                ..Default::default()
            },
            Uuid::new_v4(),
            super::super::now(),
        );
        assert_eq!(brand.slug, "acme-home-garden");
    }

    #[test]
    fn validation_requires_name_and_slug() {
        let actor = Uuid::new_v4();
        let at = super::super::now();

        let blank = Brand::from_input(BrandInput::default(), actor, at);
        assert!(blank.validate().is_err());

        let symbols_only = Brand::from_input(
            BrandInput {
                name: "***".to_string(),
                ..Default::default()
            },
            actor,
            at,
        );
        assert!(symbols_only.validate().is_err(), "empty slug is rejected");

        let ok = Brand::from_input(
            BrandInput {
                name: "Nordic".to_string(),
                ..Default::default()
            },
            actor,
            at,
        );
        assert!(ok.validate().is_ok());
    }
}
