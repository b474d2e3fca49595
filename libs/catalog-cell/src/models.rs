// libs/catalog-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// SERVICE CATALOG
// ==============================================================================

/// A treatment the clinic offers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicService {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

pub type UpdateServiceRequest = CreateServiceRequest;

// ==============================================================================
// BEFORE/AFTER GALLERY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub before_image: String,
    pub after_image: String,
    pub treatment_type: String,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub patient_consent: bool,
    #[serde(default = "default_public")]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_public() -> bool {
    true
}

/// Image fields carry URLs; uploads happen elsewhere.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGalleryItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
    pub treatment_type: Option<String>,
    /// Only honoured for admins; doctors always post as themselves.
    pub doctor: Option<Uuid>,
    pub patient_consent: Option<bool>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGalleryItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
    pub treatment_type: Option<String>,
    pub patient_consent: Option<bool>,
    pub is_public: Option<bool>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    MissingFields(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Doctor not found")]
    InvalidDoctor,

    #[error("Access denied")]
    Forbidden,

    #[error("Store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        CatalogError::Store(err.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::MissingFields(msg) => AppError::validation("missing_fields", msg),
            CatalogError::NotFound(_) => AppError::NotFound(err.to_string()),
            CatalogError::InvalidDoctor => AppError::validation("invalid_doctor", err.to_string()),
            CatalogError::Forbidden => AppError::Forbidden(err.to_string()),
            CatalogError::Store(msg) => AppError::Database(msg),
        }
    }
}
