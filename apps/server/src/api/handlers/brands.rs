//! Brand handlers

use super::{BulkInsertRequest, BulkUpdateRequest, IdsRequest};
use crate::auth::Actor;
use crate::db::CancelToken;
use crate::models::{BrandInput, BrandSearchFilter};
use crate::{state::AppState, Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub async fn list_brands(State(state): State<AppState>) -> Result<Response> {
    let brands = state.brands.get_all().await?;
    Ok((StatusCode::OK, Json(brands)).into_response())
}

pub async fn count_brands(State(state): State<AppState>) -> Result<Response> {
    let count = state.brands.count().await?;
    Ok((StatusCode::OK, Json(json!({ "count": count }))).into_response())
}

pub async fn get_brand(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Response> {
    let brand = state
        .brands
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Brand", id))?;
    Ok((StatusCode::OK, Json(brand)).into_response())
}

pub async fn get_brands_by_ids(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest<i32>>,
) -> Result<Response> {
    let brands = state.brands.get_by_ids(&req.ids).await?;
    Ok((StatusCode::OK, Json(brands)).into_response())
}

pub async fn create_brand(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<BrandInput>,
) -> Result<Response> {
    let brand = state.brands.create(actor, input).await?;
    Ok((StatusCode::CREATED, Json(brand)).into_response())
}

pub async fn update_brand(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<i32>,
    Json(input): Json<BrandInput>,
) -> Result<Response> {
    let brand = state
        .brands
        .update(actor, id, input)
        .await?
        .ok_or_else(|| Error::not_found("Brand", id))?;
    Ok((StatusCode::OK, Json(brand)).into_response())
}

pub async fn upsert_brand(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<BrandInput>,
) -> Result<Response> {
    let brand = state.brands.upsert(actor, input).await?;
    Ok((StatusCode::OK, Json(brand)).into_response())
}

/// Brands have no soft delete; a brand still referenced by products is a conflict.
pub async fn delete_brand(
    State(state): State<AppState>,
    Actor(_actor): Actor,
    Path(id): Path<i32>,
) -> Result<Response> {
    if !state.brands.delete(id).await? {
        return Err(Error::not_found("Brand", id));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn delete_brands_by_ids(
    State(state): State<AppState>,
    Actor(_actor): Actor,
    Json(req): Json<IdsRequest<i32>>,
) -> Result<Response> {
    let deleted = state.brands.delete_by_ids(&req.ids).await?;
    Ok((StatusCode::OK, Json(json!({ "deleted": deleted }))).into_response())
}

pub async fn bulk_insert_brands(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<BulkInsertRequest<BrandInput>>,
) -> Result<Response> {
    let outcome = state
        .brands
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

pub async fn bulk_update_brands(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<BulkUpdateRequest<BrandInput>>,
) -> Result<Response> {
    let outcome = state
        .brands
        .bulk_update(actor, req.items, req.batch_size, &CancelToken::none())
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub async fn search_brands(
    State(state): State<AppState>,
    Query(filter): Query<BrandSearchFilter>,
) -> Result<Response> {
    let result = state.brands.search(filter).await?;
    Ok((StatusCode::OK, Json(result)).into_response())
}
