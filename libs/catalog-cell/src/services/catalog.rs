// libs/catalog-cell/src/services/catalog.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicService, CatalogError, CreateServiceRequest, UpdateServiceRequest};
use crate::services::store::{NewService, ServicePatch, ServiceStore, SupabaseServiceStore};

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A provided field must not be blank.
fn non_blank(value: Option<String>, field: &str) -> Result<Option<String>, CatalogError> {
    match value {
        Some(raw) => present(Some(raw))
            .map(Some)
            .ok_or_else(|| CatalogError::MissingFields(format!("{} cannot be empty", field))),
        None => Ok(None),
    }
}

pub struct ServiceCatalog {
    store: Arc<dyn ServiceStore>,
}

impl ServiceCatalog {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::with_store(Arc::new(SupabaseServiceStore::new(supabase)))
    }

    pub fn with_store(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }

    pub async fn list_services(&self) -> Result<Vec<ClinicService>, CatalogError> {
        Ok(self.store.list().await?)
    }

    pub async fn create_service(&self, request: CreateServiceRequest) -> Result<ClinicService, CatalogError> {
        let (Some(title), Some(category)) = (present(request.title), present(request.category)) else {
            return Err(CatalogError::MissingFields("Title and category are required".to_string()));
        };

        let now = Utc::now();
        let service = self
            .store
            .insert(NewService {
                title,
                description: present(request.description),
                category,
                image: present(request.image),
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Service {} created", service.id);
        Ok(service)
    }

    pub async fn update_service(&self, id: Uuid, request: UpdateServiceRequest) -> Result<ClinicService, CatalogError> {
        let patch = ServicePatch {
            title: non_blank(request.title, "Title")?,
            category: non_blank(request.category, "Category")?,
            description: request.description,
            image: request.image,
            updated_at: Some(Utc::now()),
        };

        self.store
            .update(id, patch)
            .await?
            .ok_or(CatalogError::NotFound("Service"))
    }

    pub async fn delete_service(&self, id: Uuid) -> Result<(), CatalogError> {
        if !self.store.delete(id).await? {
            return Err(CatalogError::NotFound("Service"));
        }
        info!("Service {} deleted", id);
        Ok(())
    }
}
