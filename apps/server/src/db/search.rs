//! Keyset search query construction
//!
//! The count query and the page query share one predicate writer, but only
//! the page query gets the cursor, ordering and limit. `total` therefore
//! depends on the business filters alone.

use crate::models::{BrandSearchFilter, ProductSearchFilter};
use sqlx::{Postgres, QueryBuilder};

/// Page size used when a filter carries no limit (or `0`).
pub const DEFAULT_SEARCH_LIMIT: i64 = 10;

pub fn effective_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_SEARCH_LIMIT,
    }
}

/// Escape LIKE metacharacters so user input only matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(input: &str) -> String {
    format!("%{}%", escape_like(input))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Appends `WHERE`/`AND`-joined predicates to a query.
struct Predicates<'q> {
    qb: &'q mut QueryBuilder<'static, Postgres>,
    started: bool,
}

impl<'q> Predicates<'q> {
    fn new(qb: &'q mut QueryBuilder<'static, Postgres>) -> Self {
        Self { qb, started: false }
    }

    fn next(&mut self) -> &mut QueryBuilder<'static, Postgres> {
        self.qb.push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
        &mut *self.qb
    }

    fn ilike(&mut self, column: &str, pattern: &str) {
        self.next()
            .push(column)
            .push(" ILIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\'");
    }

    fn ilike_any(&mut self, columns: &[&str], pattern: &str) {
        let qb = self.next();
        qb.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column)
                .push(" ILIKE ")
                .push_bind(pattern.to_string())
                .push(" ESCAPE '\\'");
        }
        qb.push(")");
    }
}

fn push_product_predicates(predicates: &mut Predicates<'_>, filter: &ProductSearchFilter) {
    predicates.next().push("p.deleted = FALSE");
    if let Some(brand_id) = filter.brand_id {
        predicates.next().push("p.brand_id = ").push_bind(brand_id);
    }
    if let Some(name) = non_blank(&filter.name) {
        predicates.ilike("p.name", &contains_pattern(name));
    }
    if let Some(q) = non_blank(&filter.q) {
        predicates.ilike_any(&["p.name", "p.sku", "p.summary"], &contains_pattern(q));
    }
}

fn push_brand_predicates(predicates: &mut Predicates<'_>, filter: &BrandSearchFilter) {
    if let Some(name) = non_blank(&filter.name) {
        predicates.ilike("b.name", &contains_pattern(name));
    }
    if let Some(q) = non_blank(&filter.q) {
        predicates.ilike_any(&["b.name", "b.slug"], &contains_pattern(q));
    }
}

fn push_page_tail(
    qb: &mut QueryBuilder<'static, Postgres>,
    order_column: &str,
    limit: Option<i64>,
    offset: Option<i64>,
) {
    qb.push(" ORDER BY ")
        .push(order_column)
        .push(" DESC LIMIT ")
        .push_bind(effective_limit(limit));
    if let Some(offset) = offset.filter(|o| *o > 0) {
        qb.push(" OFFSET ").push_bind(offset);
    }
}

pub fn product_count_query(filter: &ProductSearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM catalog.products p");
    push_product_predicates(&mut Predicates::new(&mut qb), filter);
    qb
}

pub fn product_page_query(filter: &ProductSearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT p.id, p.name, p.price, p.brand_id, b.name AS brand_name \
         FROM catalog.products p JOIN catalog.brands b ON b.id = p.brand_id",
    );
    {
        let mut predicates = Predicates::new(&mut qb);
        push_product_predicates(&mut predicates, filter);
        if let Some(last_seen) = filter.last_seen_id {
            predicates.next().push("p.id < ").push_bind(last_seen);
        }
    }
    push_page_tail(&mut qb, "p.id", filter.limit, filter.offset);
    qb
}

pub fn brand_count_query(filter: &BrandSearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM catalog.brands b");
    push_brand_predicates(&mut Predicates::new(&mut qb), filter);
    qb
}

pub fn brand_page_query(filter: &BrandSearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT b.id, b.name, b.slug, b.logo FROM catalog.brands b");
    {
        let mut predicates = Predicates::new(&mut qb);
        push_brand_predicates(&mut predicates, filter);
        if let Some(last_seen) = filter.last_seen_id {
            predicates.next().push("b.id < ").push_bind(last_seen);
        }
    }
    push_page_tail(&mut qb, "b.id", filter.limit, filter.offset);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn full_filter() -> ProductSearchFilter {
        ProductSearchFilter {
            name: Some("Alpha".into()),
            brand_id: Some(3),
            q: Some("lamp".into()),
            limit: Some(5),
            offset: None,
            last_seen_id: Some(Uuid::now_v7()),
        }
    }

    #[test]
    fn count_query_ignores_the_cursor() {
        let sql = product_count_query(&full_filter()).sql().to_string();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM catalog.products p WHERE p.deleted = FALSE \
             AND p.brand_id = $1 AND p.name ILIKE $2 ESCAPE '\\' \
             AND (p.name ILIKE $3 ESCAPE '\\' OR p.sku ILIKE $4 ESCAPE '\\' OR p.summary ILIKE $5 ESCAPE '\\')"
        );
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("p.id <"));
    }

    #[test]
    fn page_query_adds_cursor_order_and_limit() {
        let sql = product_page_query(&full_filter()).sql().to_string();
        assert!(sql.contains("JOIN catalog.brands b ON b.id = p.brand_id"));
        assert!(sql.ends_with("AND p.id < $6 ORDER BY p.id DESC LIMIT $7"));
    }

    #[test]
    fn both_queries_share_the_business_predicates() {
        let filter = full_filter();
        let count = product_count_query(&filter).sql().to_string();
        let page = product_page_query(&filter).sql().to_string();
        let predicates = count
            .split_once(" WHERE ")
            .map(|(_, p)| p.to_string())
            .unwrap();
        assert!(page.contains(&predicates));
    }

    #[test]
    fn empty_filter_only_excludes_deleted_rows() {
        let sql = product_page_query(&ProductSearchFilter::default()).sql().to_string();
        assert!(sql.ends_with("WHERE p.deleted = FALSE ORDER BY p.id DESC LIMIT $1"));

        let blank = ProductSearchFilter {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(
            product_count_query(&blank).sql().to_string(),
            "SELECT COUNT(*) FROM catalog.products p WHERE p.deleted = FALSE"
        );
    }

    #[test]
    fn offset_paging_is_supported() {
        let filter = ProductSearchFilter {
            limit: Some(20),
            offset: Some(40),
            ..Default::default()
        };
        let sql = product_page_query(&filter).sql().to_string();
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn brand_queries() {
        let filter = BrandSearchFilter {
            q: Some("acme".into()),
            last_seen_id: Some(40),
            ..Default::default()
        };
        assert_eq!(
            brand_count_query(&filter).sql().to_string(),
            "SELECT COUNT(*) FROM catalog.brands b WHERE (b.name ILIKE $1 ESCAPE '\\' OR b.slug ILIKE $2 ESCAPE '\\')"
        );
        assert!(brand_page_query(&filter)
            .sql().to_string()
            .ends_with("AND b.id < $3 ORDER BY b.id DESC LIMIT $4"));
        assert_eq!(
            brand_count_query(&BrandSearchFilter::default()).sql().to_string(),
            "SELECT COUNT(*) FROM catalog.brands b"
        );
    }

    #[test]
    fn limits_and_escaping() {
        assert_eq!(effective_limit(None), DEFAULT_SEARCH_LIMIT);
        assert_eq!(effective_limit(Some(0)), DEFAULT_SEARCH_LIMIT);
        assert_eq!(effective_limit(Some(25)), 25);
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
    }
}
