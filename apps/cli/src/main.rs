use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use catalog::{
    config::Config,
    db::{create_db_pool, run_migrations, CancelToken},
    logging,
    models::{BrandInput, BrandSearchFilter, ProductInput, ProductSearchFilter},
    state::AppState,
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Command line interface for the product catalog",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Products,
    Brands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk insert entities from a JSON array file (or "-" for stdin).
    Import {
        #[arg(value_enum)]
        kind: Kind,
        /// JSON file holding an array of product or brand inputs.
        file: PathBuf,
        /// Acting user recorded as the creator of every row.
        #[arg(long)]
        actor: Uuid,
        /// Rows per chunk (0 or omitted = configured default).
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Load the whole file in a single COPY instead of chunking.
        #[arg(long, action = ArgAction::SetTrue)]
        one_shot: bool,
        /// Update existing rows (every item needs an id) instead of inserting.
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "one_shot")]
        update: bool,
    },

    /// Keyset search; prints one page as JSON.
    Search {
        #[arg(value_enum)]
        kind: Kind,
        /// Name substring.
        #[arg(long)]
        name: Option<String>,
        /// Free text over name and sku/summary (products) or slug (brands).
        #[arg(short, long)]
        q: Option<String>,
        /// Products only.
        #[arg(long)]
        brand_id: Option<i32>,
        #[arg(short, long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
        /// Continue after this identifier (UUID for products, integer for brands).
        #[arg(long)]
        last_seen_id: Option<String>,
        #[arg(short, long)]
        pretty: bool,
    },

    /// Count live rows.
    Count {
        #[arg(value_enum)]
        kind: Kind,
    },

    /// Apply the bundled schema migrations.
    Migrate,

    /// Print CLI version.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Version => {}
        Commands::Migrate => {
            let pool = create_db_pool(&config.database)
                .await
                .context("Failed to connect to the database")?;
            run_migrations(&pool).await.context("Migration failed")?;
            eprintln!("Migrations applied");
        }
        Commands::Count { kind } => {
            let state = connect(config).await?;
            let count = match kind {
                Kind::Products => state.products.count().await?,
                Kind::Brands => state.brands.count().await?,
            };
            println!("{count}");
        }
        Commands::Search {
            kind,
            name,
            q,
            brand_id,
            limit,
            offset,
            last_seen_id,
            pretty,
        } => {
            let state = connect(config).await?;
            match kind {
                Kind::Products => {
                    let last_seen_id = last_seen_id
                        .as_deref()
                        .map(Uuid::parse_str)
                        .transpose()
                        .context("--last-seen-id must be a UUID for products")?;
                    let result = state
                        .products
                        .search(ProductSearchFilter {
                            name,
                            brand_id,
                            q,
                            limit,
                            offset,
                            last_seen_id,
                        })
                        .await?;
                    print_json(&result, pretty)?;
                }
                Kind::Brands => {
                    if brand_id.is_some() {
                        anyhow::bail!("--brand-id only applies to product search");
                    }
                    let last_seen_id = last_seen_id
                        .as_deref()
                        .map(str::parse::<i32>)
                        .transpose()
                        .context("--last-seen-id must be an integer for brands")?;
                    let result = state
                        .brands
                        .search(BrandSearchFilter {
                            name,
                            q,
                            limit,
                            offset,
                            last_seen_id,
                        })
                        .await?;
                    print_json(&result, pretty)?;
                }
            }
        }
        Commands::Import {
            kind,
            file,
            actor,
            batch_size,
            one_shot,
            update,
        } => {
            let state = connect(config).await?;
            let cancel = cancel_on_ctrl_c();
            let started = std::time::Instant::now();

            let rows = match (kind, update) {
                (Kind::Products, false) => {
                    let items: Vec<ProductInput> = load_items(&file)?;
                    state
                        .products
                        .bulk_insert(actor, items, batch_size, one_shot, &cancel)
                        .await?
                        .rows
                }
                (Kind::Products, true) => {
                    let items: Vec<ProductInput> = load_items(&file)?;
                    state
                        .products
                        .bulk_update(actor, items, batch_size, &cancel)
                        .await?
                        .rows
                }
                (Kind::Brands, false) => {
                    let items: Vec<BrandInput> = load_items(&file)?;
                    state
                        .brands
                        .bulk_insert(actor, items, batch_size, one_shot, &cancel)
                        .await?
                        .rows
                }
                (Kind::Brands, true) => {
                    let items: Vec<BrandInput> = load_items(&file)?;
                    state
                        .brands
                        .bulk_update(actor, items, batch_size, &cancel)
                        .await?
                        .rows
                }
            };

            tracing::info!(rows, update, "catalog import finished");
            eprintln!(
                "✓ {} {rows} rows in {:.2}s",
                if update { "Updated" } else { "Imported" },
                started.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}

async fn connect(config: Config) -> Result<AppState> {
    AppState::new(config)
        .await
        .context("Failed to connect to the catalog database")
}

/// A token fired by Ctrl+C, so an interrupted import rolls back instead of half-loading.
fn cancel_on_ctrl_c() -> CancelToken {
    let (handle, token) = CancelToken::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, rolling back...");
            handle.cancel();
        }
    });
    token
}

fn load_items<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = if path.to_string_lossy() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read items from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse a JSON array of items in {:?}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
