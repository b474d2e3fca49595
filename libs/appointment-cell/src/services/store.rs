// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, UserSummary};
use crate::services::policy::AppointmentScope;

const APPOINTMENTS_TABLE: &str = "appointments";
const USERS_TABLE: &str = "users";
const USER_SUMMARY_COLUMNS: &str = "id,name,email,role";

/// Row written when an appointment is booked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: String,
    pub time: String,
    pub notes: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update. Unset fields are left untouched by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentPatch {
    pub fn status(status: AppointmentStatus, now: DateTime<Utc>) -> Self {
        Self {
            doctor_id: None,
            date: None,
            time: None,
            notes: None,
            status: Some(status),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub scope: AppointmentScope,
    /// Leave out completed and cancelled appointments.
    pub open_only: bool,
}

impl AppointmentQuery {
    fn to_filter(self) -> String {
        let mut filters = Vec::new();

        match self.scope {
            AppointmentScope::All => {}
            AppointmentScope::Doctor(id) => filters.push(format!("doctor_id=eq.{}", id)),
            AppointmentScope::Patient(id) => filters.push(format!("patient_id=eq.{}", id)),
        }

        if self.open_only {
            filters.push(format!(
                "status=not.in.({},{})",
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed
            ));
        }

        filters.push("order=date.asc,time.asc".to_string());
        filters.join("&")
    }
}

fn guarded_filter(id: Uuid, expected: &[AppointmentStatus]) -> String {
    let statuses = expected
        .iter()
        .map(AppointmentStatus::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("id=eq.{}&status=in.({})", id, statuses)
}

// ==============================================================================
// STORE SEAMS
// ==============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>>;

    async fn list(&self, query: AppointmentQuery) -> Result<Vec<Appointment>>;

    /// Returns `None` when no row matched `id`.
    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Option<Appointment>>;

    /// Like `update`, but only while the stored status is one of `expected`.
    /// `None` means the row is gone or has already moved on.
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: Vec<AppointmentStatus>,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>>;

    async fn find_users(&self, ids: Vec<Uuid>) -> Result<Vec<UserSummary>>;
}

// ==============================================================================
// SUPABASE IMPLEMENTATIONS
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment> {
        debug!(
            "Inserting appointment for patient {} with doctor {}",
            appointment.patient_id, appointment.doctor_id
        );
        self.supabase
            .insert(APPOINTMENTS_TABLE, serde_json::to_value(&appointment)?)
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        self.supabase
            .select_one(APPOINTMENTS_TABLE, &format!("id=eq.{}", id))
            .await
    }

    async fn list(&self, query: AppointmentQuery) -> Result<Vec<Appointment>> {
        let filter = query.to_filter();
        debug!("Listing appointments with filter: {}", filter);
        self.supabase.select(APPOINTMENTS_TABLE, &filter).await
    }

    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Option<Appointment>> {
        let rows: Vec<Appointment> = self
            .supabase
            .update(
                APPOINTMENTS_TABLE,
                &format!("id=eq.{}", id),
                serde_json::to_value(&patch)?,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: Vec<AppointmentStatus>,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>> {
        let rows: Vec<Appointment> = self
            .supabase
            .update(
                APPOINTMENTS_TABLE,
                &guarded_filter(id, &expected),
                serde_json::to_value(&patch)?,
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

pub struct SupabaseUserDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>> {
        self.supabase
            .select_one(
                USERS_TABLE,
                &format!("id=eq.{}&select={}", id, USER_SUMMARY_COLUMNS),
            )
            .await
    }

    async fn find_users(&self, ids: Vec<Uuid>) -> Result<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        self.supabase
            .select(
                USERS_TABLE,
                &format!("id=in.({})&select={}", id_list, USER_SUMMARY_COLUMNS),
            )
            .await
    }
}
