// libs/catalog-cell/src/services/store.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicService, GalleryItem};

const SERVICES_TABLE: &str = "services";
const GALLERY_TABLE: &str = "gallery_items";
const USERS_TABLE: &str = "users";
const NEWEST_FIRST: &str = "order=created_at.desc";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewService {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGalleryItem {
    pub title: String,
    pub description: Option<String>,
    pub before_image: String,
    pub after_image: String,
    pub treatment_type: String,
    pub doctor_id: Uuid,
    pub patient_consent: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GalleryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_consent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Which gallery rows a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryFilter {
    Public,
    Doctor(Uuid),
    All,
}

impl GalleryFilter {
    fn to_query(self) -> String {
        match self {
            GalleryFilter::Public => format!("is_public=eq.true&{}", NEWEST_FIRST),
            GalleryFilter::Doctor(id) => format!("doctor_id=eq.{}&{}", id, NEWEST_FIRST),
            GalleryFilter::All => NEWEST_FIRST.to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Newest first.
    async fn list(&self) -> Result<Vec<ClinicService>>;

    async fn insert(&self, service: NewService) -> Result<ClinicService>;

    async fn update(&self, id: Uuid, patch: ServicePatch) -> Result<Option<ClinicService>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn list(&self, filter: GalleryFilter) -> Result<Vec<GalleryItem>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GalleryItem>>;

    async fn insert(&self, item: NewGalleryItem) -> Result<GalleryItem>;

    async fn update(&self, id: Uuid, patch: GalleryPatch) -> Result<Option<GalleryItem>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Whether `id` names an existing user with the doctor role.
    async fn is_doctor(&self, id: Uuid) -> Result<bool>;
}

fn doctor_filter(id: Uuid) -> String {
    format!("id=eq.{}&role=eq.doctor&select=id", id)
}

pub struct SupabaseServiceStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseServiceStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl ServiceStore for SupabaseServiceStore {
    async fn list(&self) -> Result<Vec<ClinicService>> {
        self.supabase.select(SERVICES_TABLE, NEWEST_FIRST).await
    }

    async fn insert(&self, service: NewService) -> Result<ClinicService> {
        self.supabase
            .insert(SERVICES_TABLE, serde_json::to_value(&service)?)
            .await
    }

    async fn update(&self, id: Uuid, patch: ServicePatch) -> Result<Option<ClinicService>> {
        let rows: Vec<ClinicService> = self
            .supabase
            .update(SERVICES_TABLE, &format!("id=eq.{}", id), serde_json::to_value(&patch)?)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = self
            .supabase
            .delete(SERVICES_TABLE, &format!("id=eq.{}", id))
            .await?;
        Ok(removed > 0)
    }
}

pub struct SupabaseGalleryStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseGalleryStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl GalleryStore for SupabaseGalleryStore {
    async fn list(&self, filter: GalleryFilter) -> Result<Vec<GalleryItem>> {
        self.supabase.select(GALLERY_TABLE, &filter.to_query()).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GalleryItem>> {
        self.supabase
            .select_one(GALLERY_TABLE, &format!("id=eq.{}", id))
            .await
    }

    async fn insert(&self, item: NewGalleryItem) -> Result<GalleryItem> {
        self.supabase
            .insert(GALLERY_TABLE, serde_json::to_value(&item)?)
            .await
    }

    async fn update(&self, id: Uuid, patch: GalleryPatch) -> Result<Option<GalleryItem>> {
        let rows: Vec<GalleryItem> = self
            .supabase
            .update(GALLERY_TABLE, &format!("id=eq.{}", id), serde_json::to_value(&patch)?)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = self
            .supabase
            .delete(GALLERY_TABLE, &format!("id=eq.{}", id))
            .await?;
        Ok(removed > 0)
    }

    async fn is_doctor(&self, id: Uuid) -> Result<bool> {
        let row: Option<serde_json::Value> = self
            .supabase
            .select_one(USERS_TABLE, &doctor_filter(id))
            .await?;
        Ok(row.is_some())
    }
}
