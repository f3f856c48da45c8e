//! Shared helpers for the integration suites
//!
//! In-memory apps are always available. Postgres helpers return `None` (and the
//! calling test returns early) unless `CATALOG__DATABASE__TEST_DATABASE_URL` or
//! `TEST_DATABASE_URL` is set.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use catalog::{
    api::create_router,
    config::Config,
    db::{
        pool::create_pool_for, run_migrations, BrandStore, InMemoryCatalog, ProductStore,
        Repository,
    },
    models::{self, Brand, BrandInput, ProductInput},
    state::AppState,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;
use uuid::Uuid;

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub catalog: Arc<InMemoryCatalog>,
    pub actor: Uuid,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let actor = self.actor.to_string();
        self.request_with_extra_headers(method, path, body, &[("x-actor-id", actor.as_str())])
            .await
    }

    /// Same as [`TestApp::request`] without the actor header.
    pub async fn anonymous_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        self.request_with_extra_headers(method, path, body, &[])
            .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, bytes))
    }
}

pub fn test_app_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<TestApp> {
    let mut config = Config::defaults();
    configure(&mut config);

    let catalog = Arc::new(InMemoryCatalog::new());
    let products: Arc<dyn ProductStore> = catalog.clone();
    let brands: Arc<dyn BrandStore> = catalog.clone();
    let state = AppState::with_stores(config, products, brands)?;

    Ok(TestApp {
        router: create_router(state),
        catalog,
        actor: Uuid::new_v4(),
    })
}

pub async fn with_test_app<F>(test: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> TestFuture,
{
    with_test_app_with_config(|_| {}, test).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, test: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: FnOnce(TestApp) -> TestFuture,
{
    let app = test_app_with_config(configure)?;
    test(app).await
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "unexpected status for {context}");
}

pub fn to_json_body<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn product_input(brand_id: i32, name: &str) -> ProductInput {
    ProductInput {
        brand_id,
        name: name.to_string(),
        sku: Some(format!("SKU-{name}")),
        stock_quantity: 3,
        price: Decimal::new(1999, 2),
        ..Default::default()
    }
}

pub fn brand_input(name: &str) -> BrandInput {
    BrandInput {
        name: name.to_string(),
        ..Default::default()
    }
}

/// Insert one brand straight into a store, bypassing the services.
pub async fn seed_brand<S>(store: &S, name: &str) -> anyhow::Result<Brand>
where
    S: Repository<Brand> + ?Sized,
{
    let mut brand = Brand::from_input(brand_input(name), Uuid::new_v4(), models::now());
    store.insert(&mut brand).await?;
    Ok(brand)
}

fn test_database_url() -> Option<String> {
    std::env::var("CATALOG__DATABASE__TEST_DATABASE_URL")
        .or_else(|_| std::env::var("TEST_DATABASE_URL"))
        .ok()
        .filter(|url| !url.is_empty())
}

/// Postgres tests share one schema, so they run one at a time within a binary.
pub fn pg_serial() -> &'static tokio::sync::Mutex<()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
}

/// Migrated, emptied test database, or `None` when none is configured.
pub async fn pg_pool() -> anyhow::Result<Option<PgPool>> {
    let Some(url) = test_database_url() else {
        eprintln!("skipping: TEST_DATABASE_URL is not set");
        return Ok(None);
    };

    let mut config = Config::defaults();
    config.database.pool_min_size = 0;
    config.database.pool_max_size = 8;
    let pool = create_pool_for(&config.database, &url).await?;
    run_migrations(&pool).await?;
    sqlx::query("TRUNCATE catalog.products, catalog.brands RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await?;
    Ok(Some(pool))
}
