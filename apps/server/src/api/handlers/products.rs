//! Product handlers

use super::{BulkInsertRequest, BulkUpdateRequest, IdsRequest};
use crate::auth::Actor;
use crate::db::CancelToken;
use crate::models::{ProductInput, ProductSearchFilter};
use crate::{state::AppState, Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

pub async fn list_products(State(state): State<AppState>) -> Result<Response> {
    let products = state.products.get_all().await?;
    Ok((StatusCode::OK, Json(products)).into_response())
}

pub async fn count_products(State(state): State<AppState>) -> Result<Response> {
    let count = state.products.count().await?;
    Ok((StatusCode::OK, Json(json!({ "count": count }))).into_response())
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let product = state
        .products
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Product", id))?;
    Ok((StatusCode::OK, Json(product)).into_response())
}

pub async fn get_products_by_ids(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest<Uuid>>,
) -> Result<Response> {
    let products = state.products.get_by_ids(&req.ids).await?;
    Ok((StatusCode::OK, Json(products)).into_response())
}

pub async fn create_product(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<ProductInput>,
) -> Result<Response> {
    let product = state.products.create(actor, input).await?;
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

pub async fn update_product(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> Result<Response> {
    let product = state
        .products
        .update(actor, id, input)
        .await?
        .ok_or_else(|| Error::not_found("Product", id))?;
    Ok((StatusCode::OK, Json(product)).into_response())
}

pub async fn upsert_product(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<ProductInput>,
) -> Result<Response> {
    let product = state.products.upsert(actor, input).await?;
    Ok((StatusCode::OK, Json(product)).into_response())
}

/// `DELETE /products/:id` flags the row; the data stays in place.
pub async fn soft_delete_product(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    if !state.products.soft_delete(actor, id).await? {
        return Err(Error::not_found("Product", id));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn delete_product(
    State(state): State<AppState>,
    Actor(_actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    if !state.products.delete(id).await? {
        return Err(Error::not_found("Product", id));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn delete_products_by_ids(
    State(state): State<AppState>,
    Actor(_actor): Actor,
    Json(req): Json<IdsRequest<Uuid>>,
) -> Result<Response> {
    let deleted = state.products.delete_by_ids(&req.ids).await?;
    Ok((StatusCode::OK, Json(json!({ "deleted": deleted }))).into_response())
}

pub async fn bulk_insert_products(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<BulkInsertRequest<ProductInput>>,
) -> Result<Response> {
    let outcome = state
        .products
        .bulk_insert(
            actor,
            req.items,
            req.batch_size,
            req.one_shot,
            &CancelToken::none(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

pub async fn bulk_update_products(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<BulkUpdateRequest<ProductInput>>,
) -> Result<Response> {
    let outcome = state
        .products
        .bulk_update(actor, req.items, req.batch_size, &CancelToken::none())
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub async fn search_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductSearchFilter>,
) -> Result<Response> {
    let result = state.products.search(filter).await?;
    Ok((StatusCode::OK, Json(result)).into_response())
}
