use crate::api::handlers::brands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn brand_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(brands::list_brands).post(brands::create_brand))
        .route("/count", get(brands::count_brands))
        .route("/search", get(brands::search_brands))
        .route("/upsert", post(brands::upsert_brand))
        .route("/by-ids", post(brands::get_brands_by_ids))
        .route("/delete-by-ids", post(brands::delete_brands_by_ids))
        .route(
            "/bulk",
            post(brands::bulk_insert_brands).put(brands::bulk_update_brands),
        )
        .route(
            "/:id",
            get(brands::get_brand)
                .put(brands::update_brand)
                .delete(brands::delete_brand),
        )
}
