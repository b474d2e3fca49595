// libs/user-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::{ApiJson, ApiPath};
use shared_utils::jwt::validate_token;

use crate::models::{
    AdminUpdateUserRequest, ChangePasswordRequest, CreateUserRequest, LoginOutcome, LoginRequest,
    RegisterRequest, ResetPasswordRequest, UpdateProfileRequest,
};
use crate::services::UserService;

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

// ==============================================================================
// PUBLIC
// ==============================================================================

#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user_service = UserService::new(&state);

    let user = user_service.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": user
        })),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let user_service = UserService::new(&state);

    match user_service.login(request).await? {
        LoginOutcome::Authenticated(session) => Ok(Json(session).into_response()),
        LoginOutcome::PasswordChangeRequired { reset_token } => Ok((
            StatusCode::FORBIDDEN,
            Json(json!({
                "message": "You must change your password before logging in",
                "error": "PASSWORD_CHANGE_REQUIRED",
                "reset_token": reset_token
            })),
        )
            .into_response()),
    }
}

/// Token introspection for other services.
pub async fn validate(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = validate_token(token, &state.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

// ==============================================================================
// OWN PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn get_me(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile = UserService::new(&state).get_profile(user.id).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = UserService::new(&state)
        .update_profile(user.id, request)
        .await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": profile
    })))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    UserService::new(&state)
        .change_password(user.id, request)
        .await?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

// ==============================================================================
// DIRECTORY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctors = UserService::new(&state).list_users(Some(Role::Doctor)).await?;

    Ok(Json(json!({ "doctors": doctors })))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patients = UserService::new(&state).list_users(Some(Role::Patient)).await?;

    Ok(Json(json!({ "patients": patients })))
}

// ==============================================================================
// ADMINISTRATION
// ==============================================================================

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let users = UserService::new(&state).list_users(None).await?;

    Ok(Json(json!({ "users": users })))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_role(&[Role::Admin])?;

    let created = UserService::new(&state).create_user(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": created
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AdminUpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let updated = UserService::new(&state)
        .admin_update_user(user_id, request)
        .await?;

    Ok(Json(json!({
        "message": "User updated successfully",
        "user": updated
    })))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    UserService::new(&state).delete_user(user_id).await?;

    Ok(Json(json!({ "message": "User deleted" })))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    UserService::new(&state).reset_password(request).await?;

    Ok(Json(json!({
        "message": "Password reset. The user must change it at next login."
    })))
}
