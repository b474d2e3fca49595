use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, Path, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
    Json,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::de::DeserializeOwned;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

fn authenticate(config: &AppConfig, request: &Request<Body>) -> Result<User, AppError> {
    if !request.headers().contains_key("Authorization") {
        return Err(AppError::Auth("No token, authorization denied".to_string()));
    }

    let auth = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    validate_token(auth.token(), &config.jwt_secret).map_err(AppError::Auth)
}

/// Verifies the bearer token and makes the `User` available as an extension.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&config, &request)?;

    if user.is_password_change_only() {
        return Err(AppError::Auth("Password change required before continuing".to_string()));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Like `auth_middleware`, but also admits tokens restricted to changing a password.
pub async fn password_change_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&config, &request)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// JSON body whose rejections answer 400 with the usual error body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::validation("invalid_body", rejection.body_text())),
        }
    }
}

/// Path parameters whose rejections answer 400 with the usual error body.
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(AppError::validation("invalid_path", rejection.body_text())),
        }
    }
}
