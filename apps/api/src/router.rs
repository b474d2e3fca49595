use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use catalog_cell::router::{gallery_routes, service_routes};
use shared_config::AppConfig;
use user_cell::router::{auth_routes, user_routes};

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/api/users", user_routes(state.clone()))
        .nest("/api/auth", auth_routes(state.clone()))
        .nest("/api/appointments", appointment_routes(state.clone()))
        .nest("/api/services", service_routes(state.clone()))
        .nest("/api/gallery", gallery_routes(state))
}
