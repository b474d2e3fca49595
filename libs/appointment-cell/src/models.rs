// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// Stored appointment. `date` and `time` are kept as written so that legacy
/// rows with unparseable values still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub notes: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The point in time obtained from `date` + `time` written in the clinic's offset.
    pub fn effective_instant(&self, clinic_offset: FixedOffset) -> Option<DateTime<Utc>> {
        let date = parse_date(&self.date)?;
        let time = parse_time(&self.time)?;
        combine(date, time, clinic_offset)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Completed and cancelled appointments keep their schedule frozen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::InvalidStatus(other.to_string())),
        }
    }
}

/// Public part of a referenced user. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// An appointment with its participants resolved, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub patient: Option<UserSummary>,
    pub doctor: Option<UserSummary>,
    pub date: String,
    pub time: String,
    pub notes: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentView {
    pub fn new(
        appointment: Appointment,
        patient: Option<UserSummary>,
        doctor: Option<UserSummary>,
    ) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            patient,
            doctor,
            date: appointment.date,
            time: appointment.time,
            notes: appointment.notes,
            status: appointment.status,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Body of `POST /appointments` and `PUT /appointments/{id}`. Every field is
/// optional at the wire level so that missing values surface as validation
/// errors rather than body rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub notes: Option<String>,
    /// Only admins may book on behalf of another patient.
    pub patient: Option<Uuid>,
}

pub type UpdateAppointmentRequest = BookAppointmentRequest;

/// `status` is kept raw so a non-string value reads as an unknown status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<serde_json::Value>,
}

impl UpdateStatusRequest {
    pub fn status_text(&self) -> Option<String> {
        match self.status.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(status) => Some(status.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorizedAppointments<T> {
    pub upcoming: Vec<T>,
    pub past: Vec<T>,
    pub completed: Vec<T>,
    pub cancelled: Vec<T>,
}

impl<T> Default for CategorizedAppointments<T> {
    fn default() -> Self {
        Self {
            upcoming: Vec::new(),
            past: Vec::new(),
            completed: Vec::new(),
            cancelled: Vec::new(),
        }
    }
}

impl<T> CategorizedAppointments<T> {
    pub fn len(&self) -> usize {
        self.upcoming.len() + self.past.len() + self.completed.len() + self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> AppointmentSummary {
        AppointmentSummary {
            total: self.len(),
            upcoming: self.upcoming.len(),
            past: self.past.len(),
            completed: self.completed.len(),
            cancelled: self.cancelled.len(),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> CategorizedAppointments<U> {
        CategorizedAppointments {
            upcoming: self.upcoming.into_iter().map(&mut f).collect(),
            past: self.past.into_iter().map(&mut f).collect(),
            completed: self.completed.into_iter().map(&mut f).collect(),
            cancelled: self.cancelled.into_iter().map(&mut f).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppointmentSummary {
    pub total: usize,
    pub upcoming: usize,
    pub past: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentListing {
    pub appointments: Vec<AppointmentView>,
    pub categorized: CategorizedAppointments<AppointmentView>,
    pub summary: AppointmentSummary,
}

// ==============================================================================
// DATE/TIME PARSING
// ==============================================================================

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its calendar date is used).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Accepts 24h `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

pub fn combine(date: NaiveDate, time: NaiveTime, clinic_offset: FixedOffset) -> Option<DateTime<Utc>> {
    NaiveDateTime::new(date, time)
        .and_local_timezone(clinic_offset)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Doctor, date, and time are required")]
    MissingFields,

    #[error("Invalid date format")]
    InvalidDate,

    #[error("Invalid time format, expected HH:MM")]
    InvalidTime,

    #[error("Appointment date and time cannot be in the past")]
    PastDateTime,

    #[error("Invalid doctor")]
    InvalidDoctor,

    #[error("Invalid patient")]
    InvalidPatient,

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Appointment is {0} and can no longer be changed")]
    TerminalStatus(AppointmentStatus),

    #[error("Store error: {0}")]
    Store(String),
}

impl AppointmentError {
    /// Machine-readable code for validation failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppointmentError::MissingFields => Some("missing_fields"),
            AppointmentError::InvalidDate => Some("invalid_date"),
            AppointmentError::InvalidTime => Some("invalid_time"),
            AppointmentError::PastDateTime => Some("past_datetime"),
            AppointmentError::InvalidDoctor => Some("invalid_doctor"),
            AppointmentError::InvalidPatient => Some("invalid_patient"),
            AppointmentError::InvalidStatus(_) => Some("invalid_status"),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::Store(err.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        if let Some(code) = err.code() {
            return AppError::validation(code, err.to_string());
        }

        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::TerminalStatus(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Store(msg) => AppError::Database(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
