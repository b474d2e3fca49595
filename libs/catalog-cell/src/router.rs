// libs/catalog-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn service_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route("/", get(handlers::list_services));

    // Admin role is checked per handler
    let protected_routes = Router::new()
        .route("/", post(handlers::create_service))
        .route(
            "/{service_id}",
            put(handlers::update_service).delete(handlers::delete_service),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn gallery_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route("/public", get(handlers::list_public_gallery));

    let protected_routes = Router::new()
        .route(
            "/",
            get(handlers::list_gallery).post(handlers::create_gallery_item),
        )
        .route(
            "/{item_id}",
            put(handlers::update_gallery_item).delete(handlers::delete_gallery_item),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
