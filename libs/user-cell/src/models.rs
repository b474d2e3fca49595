// libs/user-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// STORED USER
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(UserError::InvalidStatus(other.to_string())),
        }
    }
}

/// Row of the `users` table, credentials included. Never serialized to clients.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub force_password_change: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the API returns for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub status: UserStatus,
    pub force_password_change: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            role: record.role,
            phone: record.phone,
            status: record.status,
            force_password_change: record.force_password_change,
            last_login: record.last_login,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: Option<String>,
}

/// Admin-side creation. Unlike registration, any role may be assigned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    /// Blank values leave the password unchanged.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(LoginResponse),
    /// Credentials were correct but the account must set a new password first.
    PasswordChangeRequired { reset_token: String },
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UserError {
    #[error("{0}")]
    MissingFields(String),

    #[error("Please use a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters long")]
    WeakPassword,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Unknown status: {0}")]
    InvalidStatus(String),

    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("This account is inactive. Please contact support.")]
    AccountInactive,

    #[error("User not found")]
    NotFound,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl UserError {
    pub fn code(&self) -> &'static str {
        match self {
            UserError::MissingFields(_) => "missing_fields",
            UserError::InvalidEmail => "invalid_email",
            UserError::WeakPassword => "weak_password",
            UserError::EmailTaken => "email_taken",
            UserError::InvalidRole(_) => "invalid_role",
            UserError::InvalidStatus(_) => "invalid_status",
            UserError::MissingCredentials => "MISSING_CREDENTIALS",
            UserError::InvalidCredentials => "INVALID_CREDENTIALS",
            UserError::AccountInactive => "ACCOUNT_INACTIVE",
            UserError::NotFound => "USER_NOT_FOUND",
            UserError::Hashing(_) | UserError::Token(_) | UserError::Store(_) => "SERVER_ERROR",
        }
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        UserError::Store(err.to_string())
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        let code = err.code();
        match err {
            UserError::InvalidCredentials => AppError::coded(StatusCode::UNAUTHORIZED, code, err.to_string()),
            UserError::AccountInactive => AppError::coded(StatusCode::FORBIDDEN, code, err.to_string()),
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::Hashing(msg) | UserError::Token(msg) => AppError::Internal(msg),
            UserError::Store(msg) => AppError::Database(msg),
            other => AppError::validation(code, other.to_string()),
        }
    }
}
