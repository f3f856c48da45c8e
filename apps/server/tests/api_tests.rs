#![allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use support::*;
use uuid::Uuid;

async fn create_brand(app: &TestApp, name: &str) -> anyhow::Result<i64> {
    let (status, _headers, body) = app
        .request(
            Method::POST,
            "/api/v1/brands",
            Some(to_json_body(&json!({ "name": name }))?),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create brand");
    let brand: Value = serde_json::from_slice(&body)?;
    Ok(brand["id"].as_i64().unwrap_or_default())
}

#[tokio::test]
async fn health_and_security_headers() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, headers, body) = app.request(Method::GET, "/health", None).await?;
            assert_status(status, StatusCode::OK, "health");

            let health: Value = serde_json::from_slice(&body)?;
            assert_eq!(health["status"], "ok");
            assert_eq!(health["store"], "embedded");

            for (name, expected) in [
                ("x-content-type-options", "nosniff"),
                ("x-frame-options", "DENY"),
                ("referrer-policy", "no-referrer"),
                ("content-security-policy", "default-src 'none'"),
            ] {
                let got = headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                assert_eq!(got, expected, "missing/incorrect header '{}'", name);
            }
            assert!(headers.get("strict-transport-security").is_none());
            assert!(headers.get("access-control-allow-origin").is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn product_lifecycle() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let brand_id = create_brand(&app, "Nordic Home").await?;

            let (status, _h, body) = app
                .request(
                    Method::POST,
                    "/api/v1/products",
                    Some(to_json_body(&json!({
                        "brandId": brand_id,
                        "name": "  Oak Table ",
                        "price": "249.90",
                        "stockQuantity": 4
                    }))?),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create product");
            let created: Value = serde_json::from_slice(&body)?;
            let id = created["id"].as_str().unwrap_or_default().to_string();
            assert_eq!(created["name"], "Oak Table");
            assert_eq!(created["createdBy"], app.actor.to_string());
            assert!(created["updatedAt"].is_null());

            let (status, _h, body) = app
                .request(
                    Method::PUT,
                    &format!("/api/v1/products/{id}"),
                    Some(to_json_body(&json!({
                        "brandId": brand_id,
                        "name": "Oak Table XL",
                        "price": 299
                    }))?),
                )
                .await?;
            assert_status(status, StatusCode::OK, "update product");
            let updated: Value = serde_json::from_slice(&body)?;
            assert_eq!(updated["name"], "Oak Table XL");
            assert_eq!(updated["updatedBy"], app.actor.to_string());
            assert!(!updated["updatedAt"].is_null());

            let (status, _h, body) = app
                .request(Method::GET, "/api/v1/products/count", None)
                .await?;
            assert_status(status, StatusCode::OK, "count");
            let count: Value = serde_json::from_slice(&body)?;
            assert_eq!(count["count"], 1);

            let (status, _h, _b) = app
                .request(Method::DELETE, &format!("/api/v1/products/{id}"), None)
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "soft delete");

            let (status, _h, body) = app
                .request(Method::GET, &format!("/api/v1/products/{id}"), None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "soft-deleted product");
            let error: Value = serde_json::from_slice(&body)?;
            assert_eq!(error["error"]["code"], "not_found");

            let raw = app
                .catalog
                .raw_product(Uuid::parse_str(&id)?)
                .await
                .expect("row kept after soft delete");
            assert!(raw.deleted);
            assert_eq!(raw.deleted_by, Some(app.actor));

            let (status, _h, _b) = app
                .request(Method::DELETE, &format!("/api/v1/products/{id}/purge"), None)
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "purge");
            assert!(app.catalog.raw_product(Uuid::parse_str(&id)?).await.is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn writes_require_an_actor() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _h, body) = app
                .anonymous_request(
                    Method::POST,
                    "/api/v1/brands",
                    Some(to_json_body(&json!({ "name": "Anon" }))?),
                )
                .await?;
            assert_status(status, StatusCode::UNAUTHORIZED, "anonymous create");
            let error: Value = serde_json::from_slice(&body)?;
            assert_eq!(error["error"]["code"], "unauthorized");

            let (status, _h, _b) = app
                .anonymous_request(Method::GET, "/api/v1/brands", None)
                .await?;
            assert_status(status, StatusCode::OK, "anonymous read");
            assert_eq!(app.catalog.store_calls(), 1);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn bearer_tokens_are_required_when_auth_is_enabled() -> anyhow::Result<()> {
    with_test_app_with_config(
        |config| {
            config.auth.enabled = true;
            config.auth.jwt_secret = Some("integration-secret".to_string());
        },
        |app| {
            Box::pin(async move {
                // The actor header alone is not enough.
                let (status, _h, _b) = app
                    .request(
                        Method::POST,
                        "/api/v1/brands",
                        Some(to_json_body(&json!({ "name": "Header Only" }))?),
                    )
                    .await?;
                assert_status(status, StatusCode::UNAUTHORIZED, "header without token");

                let (status, _h, _b) = app
                    .request_with_extra_headers(
                        Method::POST,
                        "/api/v1/brands",
                        Some(to_json_body(&json!({ "name": "Garbage" }))?),
                        &[("authorization", "Bearer not.a.jwt")],
                    )
                    .await?;
                assert_status(status, StatusCode::UNAUTHORIZED, "malformed token");
                Ok(())
            })
        },
    )
    .await
}

#[tokio::test]
async fn bulk_insert_then_update_over_http() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let brand_id = create_brand(&app, "Acme").await?;
            let items: Vec<Value> = (0..12)
                .map(|i| json!({ "brandId": brand_id, "name": format!("Widget {i}"), "price": 5 }))
                .collect();

            let (status, _h, body) = app
                .request(
                    Method::POST,
                    "/api/v1/products/bulk",
                    Some(to_json_body(&json!({ "items": items, "batchSize": 5 }))?),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "bulk insert");
            let outcome: Value = serde_json::from_slice(&body)?;
            assert_eq!(outcome["rows"], 12);
            let ids: Vec<String> = outcome["ids"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            assert_eq!(ids.len(), 12);

            let updates: Vec<Value> = ids
                .iter()
                .map(|id| json!({ "id": id, "brandId": brand_id, "name": "Renamed", "price": 6 }))
                .collect();
            let (status, _h, body) = app
                .request(
                    Method::PUT,
                    "/api/v1/products/bulk",
                    Some(to_json_body(&json!({ "items": updates, "batchSize": 4 }))?),
                )
                .await?;
            assert_status(status, StatusCode::OK, "bulk update");
            let outcome: Value = serde_json::from_slice(&body)?;
            assert_eq!(outcome["rows"], 12);

            let order = app.catalog.product_update_order().await;
            assert_eq!(order.len(), 1);
            assert!(order[0].windows(2).all(|w| w[0] < w[1]));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn invalid_requests_map_to_bad_request() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _h, body) = app
                .request(
                    Method::POST,
                    "/api/v1/products/bulk",
                    Some(to_json_body(&json!({ "items": [] }))?),
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "empty bulk");
            let error: Value = serde_json::from_slice(&body)?;
            assert_eq!(error["error"]["code"], "invalid_input");

            let (status, _h, _b) = app
                .request(Method::GET, "/api/v1/products/search?limit=5000", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "oversized limit");

            let (status, _h, _b) = app
                .request(Method::GET, "/api/v1/products/search?offset=-1", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "negative offset");

            for price in ["1.999", "10000000000.00", "-0.01"] {
                let (status, _h, body) = app
                    .request(
                        Method::POST,
                        "/api/v1/products",
                        Some(to_json_body(&json!({ "brandId": 1, "name": "Lamp", "price": price }))?),
                    )
                    .await?;
                assert_status(status, StatusCode::BAD_REQUEST, price);
                let error: Value = serde_json::from_slice(&body)?;
                assert_eq!(error["error"]["code"], "invalid_input");
            }

            assert_eq!(app.catalog.store_calls(), 0);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn constraint_violations_are_conflicts() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            create_brand(&app, "Acme").await?;

            let (status, _h, body) = app
                .request(
                    Method::POST,
                    "/api/v1/brands",
                    Some(to_json_body(&json!({ "name": "ACME" }))?),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "duplicate slug");
            let error: Value = serde_json::from_slice(&body)?;
            assert_eq!(error["error"]["code"], "conflict");
            assert_eq!(error["error"]["constraint"], "brands_slug_key");

            let (status, _h, body) = app
                .request(
                    Method::POST,
                    "/api/v1/products",
                    Some(to_json_body(&json!({ "brandId": 999, "name": "Orphan", "price": 1 }))?),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "unknown brand");
            let error: Value = serde_json::from_slice(&body)?;
            assert_eq!(error["error"]["constraint"], "products_brand_id_fkey");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn brand_search_pages_by_keyset() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            for name in ["Alpha Audio", "Beta Audio", "Gamma Audio", "Delta Optics"] {
                create_brand(&app, name).await?;
            }

            let (status, _h, body) = app
                .request(Method::GET, "/api/v1/brands/search?q=audio&limit=2", None)
                .await?;
            assert_status(status, StatusCode::OK, "brand search");
            let page: Value = serde_json::from_slice(&body)?;
            assert_eq!(page["total"], 3);
            let ids: Vec<i64> = page["items"]
                .as_array()
                .map(|items| items.iter().filter_map(|b| b["id"].as_i64()).collect())
                .unwrap_or_default();
            assert_eq!(ids, vec![3, 2]);

            let (status, _h, body) = app
                .request(
                    Method::GET,
                    "/api/v1/brands/search?q=audio&limit=2&lastSeenId=2",
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "next page");
            let page: Value = serde_json::from_slice(&body)?;
            assert_eq!(page["total"], 3);
            assert_eq!(page["items"][0]["slug"], "alpha-audio");
            assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
            Ok(())
        })
    })
    .await
}
