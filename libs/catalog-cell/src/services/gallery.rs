// libs/catalog-cell/src/services/gallery.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{CatalogError, CreateGalleryItemRequest, GalleryItem, UpdateGalleryItemRequest};
use crate::services::store::{GalleryFilter, GalleryPatch, GalleryStore, NewGalleryItem, SupabaseGalleryStore};

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn can_manage(user: &User, item: &GalleryItem) -> bool {
    user.is_admin() || (user.role == Role::Doctor && item.doctor_id == user.id)
}

pub struct GalleryService {
    store: Arc<dyn GalleryStore>,
}

impl GalleryService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::with_store(Arc::new(SupabaseGalleryStore::new(supabase)))
    }

    pub fn with_store(store: Arc<dyn GalleryStore>) -> Self {
        Self { store }
    }

    pub async fn public_items(&self) -> Result<Vec<GalleryItem>, CatalogError> {
        Ok(self.store.list(GalleryFilter::Public).await?)
    }

    /// Admins see every item, everyone else only the items they posted.
    pub async fn items_for(&self, user: &User) -> Result<Vec<GalleryItem>, CatalogError> {
        let filter = if user.is_admin() {
            GalleryFilter::All
        } else {
            GalleryFilter::Doctor(user.id)
        };
        debug!("Listing gallery for {} with {:?}", user.id, filter);
        Ok(self.store.list(filter).await?)
    }

    pub async fn create_item(&self, user: &User, request: CreateGalleryItemRequest) -> Result<GalleryItem, CatalogError> {
        if !matches!(user.role, Role::Doctor | Role::Admin) {
            return Err(CatalogError::Forbidden);
        }

        let (Some(title), Some(before_image), Some(after_image), Some(treatment_type)) = (
            present(request.title),
            present(request.before_image),
            present(request.after_image),
            present(request.treatment_type),
        ) else {
            return Err(CatalogError::MissingFields(
                "Title, treatment type, before image and after image are required".to_string(),
            ));
        };

        let doctor_id = match (user.role, request.doctor) {
            (Role::Admin, Some(doctor)) => {
                if !self.store.is_doctor(doctor).await? {
                    warn!("Gallery item rejected: {} is not a doctor", doctor);
                    return Err(CatalogError::InvalidDoctor);
                }
                doctor
            }
            _ => user.id,
        };

        let now = Utc::now();
        let item = self
            .store
            .insert(NewGalleryItem {
                title,
                description: present(request.description),
                before_image,
                after_image,
                treatment_type,
                doctor_id,
                patient_consent: request.patient_consent.unwrap_or(false),
                is_public: request.is_public.unwrap_or(true),
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Gallery item {} created by {}", item.id, user.id);
        Ok(item)
    }

    pub async fn update_item(
        &self,
        user: &User,
        id: Uuid,
        request: UpdateGalleryItemRequest,
    ) -> Result<GalleryItem, CatalogError> {
        self.owned(user, id).await?;

        let patch = GalleryPatch {
            title: present(request.title),
            description: request.description,
            before_image: present(request.before_image),
            after_image: present(request.after_image),
            treatment_type: present(request.treatment_type),
            patient_consent: request.patient_consent,
            is_public: request.is_public,
            updated_at: Some(Utc::now()),
        };

        self.store
            .update(id, patch)
            .await?
            .ok_or(CatalogError::NotFound("Gallery item"))
    }

    pub async fn delete_item(&self, user: &User, id: Uuid) -> Result<(), CatalogError> {
        self.owned(user, id).await?;

        if !self.store.delete(id).await? {
            return Err(CatalogError::NotFound("Gallery item"));
        }
        info!("Gallery item {} deleted by {}", id, user.id);
        Ok(())
    }

    async fn owned(&self, user: &User, id: Uuid) -> Result<GalleryItem, CatalogError> {
        let item = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound("Gallery item"))?;

        if !can_manage(user, &item) {
            warn!("User {} denied access to gallery item {}", user.id, id);
            return Err(CatalogError::Forbidden);
        }
        Ok(item)
    }
}
