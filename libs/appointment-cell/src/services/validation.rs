// libs/appointment-cell/src/services/validation.rs
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::Role;

use crate::models::{combine, parse_date, parse_time, AppointmentError, BookAppointmentRequest, UserSummary};
use crate::services::store::UserDirectory;

/// Date, time and doctor as written by the client, before any lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedSchedule {
    pub doctor: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub instant: DateTime<Utc>,
}

impl RequestedSchedule {
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn time_string(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

/// A schedule whose participants have been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSchedule {
    pub date: String,
    pub time: String,
    pub instant: DateTime<Utc>,
    pub doctor: UserSummary,
    pub patient: UserSummary,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks that run without the store, in order: presence, date, time, not in the past.
/// An instant equal to `now` is accepted.
pub fn check_schedule(
    request: &BookAppointmentRequest,
    now: DateTime<Utc>,
    clinic_offset: FixedOffset,
) -> Result<RequestedSchedule, AppointmentError> {
    let (Some(doctor), Some(raw_date), Some(raw_time)) = (
        required(&request.doctor),
        required(&request.date),
        required(&request.time),
    ) else {
        return Err(AppointmentError::MissingFields);
    };

    let date = parse_date(raw_date).ok_or(AppointmentError::InvalidDate)?;
    let time = parse_time(raw_time).ok_or(AppointmentError::InvalidTime)?;
    let instant = combine(date, time, clinic_offset).ok_or(AppointmentError::InvalidDate)?;

    if instant < now {
        debug!("Rejecting schedule at {} (now {})", instant, now);
        return Err(AppointmentError::PastDateTime);
    }

    Ok(RequestedSchedule {
        doctor: doctor.to_string(),
        date,
        time,
        instant,
    })
}

/// Full booking validation: the pure checks, then the doctor, then the patient.
pub async fn validate_schedule(
    users: &dyn UserDirectory,
    request: &BookAppointmentRequest,
    patient_id: Uuid,
    now: DateTime<Utc>,
    clinic_offset: FixedOffset,
) -> Result<ValidatedSchedule, AppointmentError> {
    let requested = check_schedule(request, now, clinic_offset)?;

    let doctor_id = Uuid::parse_str(&requested.doctor).map_err(|_| AppointmentError::InvalidDoctor)?;
    let doctor = users
        .find_user(doctor_id)
        .await?
        .filter(|user| user.role == Role::Doctor)
        .ok_or(AppointmentError::InvalidDoctor)?;

    let patient = users
        .find_user(patient_id)
        .await?
        .ok_or(AppointmentError::InvalidPatient)?;

    Ok(ValidatedSchedule {
        date: requested.date_string(),
        time: requested.time_string(),
        instant: requested.instant,
        doctor,
        patient,
    })
}
