// libs/user-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, password_change_middleware};

use crate::handlers;

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login));

    // Admin-only handlers check the role themselves
    let protected_routes = Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        .route("/doctors", get(handlers::list_doctors))
        .route("/patients", get(handlers::list_patients))
        .route("/reset-password", post(handlers::reset_password))
        .route(
            "/{user_id}",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Reachable with a password-change token
    let password_routes = Router::new()
        .route("/me/password", put(handlers::change_password))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            password_change_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(password_routes)
        .with_state(state)
}

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/validate", post(handlers::validate))
        .with_state(state)
}
