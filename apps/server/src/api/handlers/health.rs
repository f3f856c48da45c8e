use crate::{db::pool::ping, state::AppState, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub async fn health_check(State(state): State<AppState>) -> Result<Response> {
    let store = match &state.db_pool {
        Some(pool) => {
            ping(pool).await?;
            "postgres"
        }
        None => "embedded",
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "store": store,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
        .into_response())
}
