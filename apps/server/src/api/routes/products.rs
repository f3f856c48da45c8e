use crate::api::handlers::products;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(products::list_products).post(products::create_product),
        )
        .route("/count", get(products::count_products))
        .route("/search", get(products::search_products))
        .route("/upsert", post(products::upsert_product))
        // Batch lookups and writes
        .route("/by-ids", post(products::get_products_by_ids))
        .route("/delete-by-ids", post(products::delete_products_by_ids))
        .route(
            "/bulk",
            post(products::bulk_insert_products).put(products::bulk_update_products),
        )
        .route(
            "/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::soft_delete_product),
        )
        .route("/:id/purge", delete(products::delete_product))
}
