//! Store layer: the bulk write engine, keyset search and the store backends

pub mod brands;
pub mod bulk;
pub mod cancel;
pub mod chunk;
pub mod copy;
pub mod memory;
pub mod pool;
pub mod products;
pub mod search;
pub mod traits;

pub use brands::PostgresBrandStore;
pub use cancel::{CancelHandle, CancelToken};
pub use chunk::DEFAULT_BATCH_SIZE;
pub use memory::InMemoryCatalog;
pub use pool::{create_db_pool, run_migrations};
pub use products::PostgresProductStore;
pub use traits::{BrandStore, BulkWriter, ProductStore, Repository, Searcher, SoftDelete};
