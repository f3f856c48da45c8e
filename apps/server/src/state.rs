//! Shared application state

use crate::{
    auth::AuthManager,
    config::Config,
    db::{
        create_db_pool, run_migrations, BrandStore, PostgresBrandStore, PostgresProductStore,
        ProductStore,
    },
    services::{BrandService, ProductService},
    Result,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthManager>,
    /// `None` when the state is built over injected stores.
    pub db_pool: Option<PgPool>,
    pub products: Arc<ProductService>,
    pub brands: Arc<BrandService>,
}

impl AppState {
    /// Connect to Postgres and wire the services over it.
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let db_pool = create_db_pool(&config.database).await?;
        if config.database.run_migrations {
            run_migrations(&db_pool).await?;
        }

        let products: Arc<dyn ProductStore> = Arc::new(PostgresProductStore::new(db_pool.clone()));
        let brands: Arc<dyn BrandStore> = Arc::new(PostgresBrandStore::new(db_pool.clone()));

        let mut state = Self::with_stores(config, products, brands)?;
        state.db_pool = Some(db_pool);

        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Build the state over explicit stores (in-memory catalog in tests, for instance).
    pub fn with_stores(
        config: Config,
        products: Arc<dyn ProductStore>,
        brands: Arc<dyn BrandStore>,
    ) -> Result<Self> {
        let auth = Arc::new(AuthManager::new(&config.auth)?);
        let product_service = ProductService::new(products, &config.bulk, &config.search);
        let brand_service = BrandService::new(brands, &config.bulk, &config.search);

        Ok(Self {
            config: Arc::new(config),
            auth,
            db_pool: None,
            products: Arc::new(product_service),
            brands: Arc::new(brand_service),
        })
    }
}
