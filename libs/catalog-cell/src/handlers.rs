// libs/catalog-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{ApiJson, ApiPath};

use crate::models::{
    CreateGalleryItemRequest, CreateServiceRequest, UpdateGalleryItemRequest, UpdateServiceRequest,
};
use crate::services::{GalleryService, ServiceCatalog};

// ==============================================================================
// SERVICES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_services(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let services = ServiceCatalog::new(&state).list_services().await?;

    Ok(Json(json!(services)))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_role(&[Role::Admin])?;

    let service = ServiceCatalog::new(&state).create_service(request).await?;

    Ok((StatusCode::CREATED, Json(json!(service))))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiPath(service_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let service = ServiceCatalog::new(&state)
        .update_service(service_id, request)
        .await?;

    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn delete_service(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiPath(service_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    ServiceCatalog::new(&state).delete_service(service_id).await?;

    Ok(Json(json!({ "message": "Service deleted" })))
}

// ==============================================================================
// GALLERY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_public_gallery(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let items = GalleryService::new(&state).public_items().await?;

    Ok(Json(json!({ "gallery_items": items })))
}

#[axum::debug_handler]
pub async fn list_gallery(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let items = GalleryService::new(&state).items_for(&user).await?;

    Ok(Json(json!({ "gallery_items": items })))
}

#[axum::debug_handler]
pub async fn create_gallery_item(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<CreateGalleryItemRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let item = GalleryService::new(&state).create_item(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Gallery item created successfully",
            "gallery_item": item
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_gallery_item(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateGalleryItemRequest>,
) -> Result<Json<Value>, AppError> {
    let item = GalleryService::new(&state)
        .update_item(&user, item_id, request)
        .await?;

    Ok(Json(json!({
        "message": "Gallery item updated successfully",
        "gallery_item": item
    })))
}

#[axum::debug_handler]
pub async fn delete_gallery_item(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiPath(item_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    GalleryService::new(&state).delete_item(&user, item_id).await?;

    Ok(Json(json!({ "message": "Gallery item deleted" })))
}
