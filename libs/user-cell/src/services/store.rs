// libs/user-cell/src/services/store.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::auth::Role;

use crate::models::{UserRecord, UserStatus};

const USERS_TABLE: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub status: UserStatus,
    pub force_password_change: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_password_change: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// `email` must already be normalized.
    async fn find_by_email(&self, email: String) -> Result<Option<UserRecord>>;

    /// Newest first, optionally restricted to one role.
    async fn list(&self, role: Option<Role>) -> Result<Vec<UserRecord>>;

    async fn insert(&self, user: NewUser) -> Result<UserRecord>;

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<UserRecord>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

pub struct SupabaseUserRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl UserRepository for SupabaseUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        self.supabase
            .select_one(USERS_TABLE, &format!("id=eq.{}", id))
            .await
    }

    async fn find_by_email(&self, email: String) -> Result<Option<UserRecord>> {
        debug!("Looking up user by email");
        self.supabase
            .select_one(
                USERS_TABLE,
                &format!("email=eq.{}", urlencoding::encode(&email)),
            )
            .await
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<UserRecord>> {
        let query = match role {
            Some(role) => format!("role=eq.{}&order=created_at.desc", role),
            None => "order=created_at.desc".to_string(),
        };
        self.supabase.select(USERS_TABLE, &query).await
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord> {
        self.supabase
            .insert(USERS_TABLE, serde_json::to_value(&user)?)
            .await
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<UserRecord>> {
        let rows: Vec<UserRecord> = self
            .supabase
            .update(USERS_TABLE, &format!("id=eq.{}", id), serde_json::to_value(&patch)?)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = self
            .supabase
            .delete(USERS_TABLE, &format!("id=eq.{}", id))
            .await?;
        Ok(removed > 0)
    }
}
