// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, AppointmentListing, AppointmentStatus, AppointmentView,
    BookAppointmentRequest, UpdateAppointmentRequest, UserSummary,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy;
use crate::services::store::{
    AppointmentPatch, AppointmentQuery, AppointmentStore, NewAppointment, SupabaseAppointmentStore,
    SupabaseUserDirectory, UserDirectory,
};
use crate::services::validation::validate_schedule;

const OPEN_STATUSES: [AppointmentStatus; 2] = [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    users: Arc<dyn UserDirectory>,
    lifecycle_service: AppointmentLifecycleService,
    clinic_offset: FixedOffset,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self::with_stores(
            Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase))),
            Arc::new(SupabaseUserDirectory::new(supabase)),
            config.clinic_offset(),
        )
    }

    pub fn with_stores(
        appointments: Arc<dyn AppointmentStore>,
        users: Arc<dyn UserDirectory>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            appointments,
            users,
            lifecycle_service: AppointmentLifecycleService::new(clinic_offset),
            clinic_offset,
        }
    }

    // ==========================================================================
    // CREATION
    // ==========================================================================

    pub async fn book_appointment(
        &self,
        requester: &User,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, AppointmentError> {
        let patient_id = policy::resolve_booking_patient(requester, request.patient)?;

        let schedule = validate_schedule(
            self.users.as_ref(),
            &request,
            patient_id,
            now,
            self.clinic_offset,
        )
        .await?;

        let appointment = self
            .appointments
            .insert(NewAppointment {
                patient_id,
                doctor_id: schedule.doctor.id,
                date: schedule.date,
                time: schedule.time,
                notes: request.notes.unwrap_or_default(),
                status: AppointmentStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            "Appointment {} booked for patient {} with doctor {} at {}",
            appointment.id, patient_id, appointment.doctor_id, schedule.instant
        );

        Ok(AppointmentView::new(
            appointment,
            Some(schedule.patient),
            Some(schedule.doctor),
        ))
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    /// Role-scoped listing. Overdue open appointments are completed before
    /// they are categorized.
    pub async fn list_appointments(
        &self,
        requester: &User,
        now: DateTime<Utc>,
    ) -> Result<AppointmentListing, AppointmentError> {
        let query = AppointmentQuery {
            scope: policy::visibility_scope(requester),
            open_only: false,
        };
        let mut appointments = self.appointments.list(query).await?;
        debug!("Loaded {} appointments for {}", appointments.len(), requester.id);

        self.reconcile_overdue(&mut appointments, now).await;

        let participants = self.participants(&appointments).await?;
        let view = |appointment: Appointment| view_with(appointment, &participants);

        let flat = appointments.iter().cloned().map(view).collect();
        let categorized = self.lifecycle_service.categorize(appointments, now).map(view);
        let summary = categorized.summary();

        Ok(AppointmentListing {
            appointments: flat,
            categorized,
            summary,
        })
    }

    /// Open appointments whose instant has not passed, soonest first.
    pub async fn upcoming_appointments(
        &self,
        requester: &User,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let query = AppointmentQuery {
            scope: policy::visibility_scope(requester),
            open_only: true,
        };

        let mut upcoming: Vec<(DateTime<Utc>, Appointment)> = self
            .appointments
            .list(query)
            .await?
            .into_iter()
            .filter(|appointment| self.lifecycle_service.is_upcoming(appointment, now))
            .filter_map(|appointment| {
                self.lifecycle_service
                    .effective_instant(&appointment)
                    .map(|at| (at, appointment))
            })
            .collect();
        upcoming.sort_by_key(|(at, _)| *at);

        let appointments: Vec<Appointment> = upcoming.into_iter().map(|(_, appt)| appt).collect();
        let participants = self.participants(&appointments).await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| view_with(appointment, &participants))
            .collect())
    }

    pub async fn get_appointment(
        &self,
        requester: &User,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.find(appointment_id).await?;
        policy::ensure_can_view(requester, &appointment)?;
        self.to_view(appointment).await
    }

    // ==========================================================================
    // MUTATIONS
    // ==========================================================================

    /// Reschedules an open appointment. The patient never changes and omitted
    /// notes keep their stored value.
    pub async fn update_appointment(
        &self,
        requester: &User,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.find(appointment_id).await?;
        policy::ensure_can_edit(requester, &appointment)?;

        let schedule = validate_schedule(
            self.users.as_ref(),
            &request,
            appointment.patient_id,
            now,
            self.clinic_offset,
        )
        .await?;

        let patch = AppointmentPatch {
            doctor_id: Some(schedule.doctor.id),
            date: Some(schedule.date),
            time: Some(schedule.time),
            notes: request.notes,
            status: None,
            updated_at: now,
        };

        let updated = self
            .appointments
            .update(appointment_id, patch)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} rescheduled by {}", appointment_id, requester.id);

        Ok(AppointmentView::new(
            updated,
            Some(schedule.patient),
            Some(schedule.doctor),
        ))
    }

    pub async fn update_status(
        &self,
        requester: &User,
        appointment_id: Uuid,
        status: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, AppointmentError> {
        let new_status: AppointmentStatus = status
            .ok_or_else(|| AppointmentError::InvalidStatus(String::new()))?
            .parse()?;

        let appointment = self.find(appointment_id).await?;
        policy::ensure_can_change_status(requester, &appointment, new_status)?;

        let updated = self.set_status(appointment_id, new_status, now).await?;

        info!(
            "Appointment {} status {} -> {} by {}",
            appointment_id, appointment.status, new_status, requester.id
        );

        self.to_view(updated).await
    }

    /// Soft cancel. The record is kept with status `cancelled`.
    pub async fn cancel_appointment(
        &self,
        requester: &User,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.find(appointment_id).await?;
        policy::ensure_can_cancel(requester, &appointment)?;

        let updated = self
            .set_status(appointment_id, AppointmentStatus::Cancelled, now)
            .await?;

        info!("Appointment {} cancelled by {}", appointment_id, requester.id);

        self.to_view(updated).await
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    /// Completes overdue open appointments in memory and writes each change
    /// back, guarded on the row still being open. A row settled elsewhere in
    /// the meantime is re-read. A failed write is logged and does not fail
    /// the read.
    async fn reconcile_overdue(&self, appointments: &mut [Appointment], now: DateTime<Utc>) -> usize {
        let overdue = self.lifecycle_service.auto_complete_overdue(appointments, now);
        let mut persisted = 0;

        for appointment in appointments.iter_mut().filter(|appt| overdue.contains(&appt.id)) {
            let patch = AppointmentPatch::status(AppointmentStatus::Completed, now);
            match self
                .appointments
                .update_if_status(appointment.id, OPEN_STATUSES.to_vec(), patch)
                .await
            {
                Ok(Some(_)) => persisted += 1,
                Ok(None) => {
                    info!("Appointment {} was settled before auto-completion", appointment.id);
                    match self.appointments.find_by_id(appointment.id).await {
                        Ok(Some(stored)) => *appointment = stored,
                        Ok(None) => warn!("Overdue appointment {} vanished before completion", appointment.id),
                        Err(e) => warn!("Failed to re-read appointment {}: {}", appointment.id, e),
                    }
                }
                Err(e) => warn!("Failed to persist completion of appointment {}: {}", appointment.id, e),
            }
        }

        if !overdue.is_empty() {
            info!("Auto-completed {} of {} overdue appointments", persisted, overdue.len());
        }

        persisted
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.appointments
            .update(appointment_id, AppointmentPatch::status(status, now))
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn participants(
        &self,
        appointments: &[Appointment],
    ) -> Result<HashMap<Uuid, UserSummary>, AppointmentError> {
        let mut ids: Vec<Uuid> = appointments
            .iter()
            .flat_map(|appt| [appt.patient_id, appt.doctor_id])
            .collect();
        ids.sort();
        ids.dedup();

        let users = self.users.find_users(ids).await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }

    async fn to_view(&self, appointment: Appointment) -> Result<AppointmentView, AppointmentError> {
        let participants = self.participants(std::slice::from_ref(&appointment)).await?;
        Ok(view_with(appointment, &participants))
    }
}

fn view_with(appointment: Appointment, participants: &HashMap<Uuid, UserSummary>) -> AppointmentView {
    let patient = participants.get(&appointment.patient_id).cloned();
    let doctor = participants.get(&appointment.doctor_id).cloned();
    AppointmentView::new(appointment, patient, doctor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{MockAppointmentStore, MockUserDirectory};
    use anyhow::anyhow;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use mockall::predicate::eq;
    use shared_models::auth::Role;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap()
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: None,
            name: None,
            role,
            purpose: None,
            created_at: None,
        }
    }

    fn summary_of(user: &User) -> UserSummary {
        UserSummary {
            id: user.id,
            name: format!("{} user", user.role),
            email: format!("{}@example.com", user.id),
            role: user.role,
        }
    }

    fn appointment(patient: &User, doctor: &User, offset: Duration, status: AppointmentStatus) -> Appointment {
        let instant = now() + offset;
        Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            date: instant.format("%Y-%m-%d").to_string(),
            time: instant.format("%H:%M").to_string(),
            notes: "checkup".to_string(),
            status,
            created_at: now() - Duration::days(10),
            updated_at: now() - Duration::days(10),
        }
    }

    fn directory_with(users: Vec<UserSummary>) -> MockUserDirectory {
        let mut directory = MockUserDirectory::new();
        let lookup = users.clone();
        directory
            .expect_find_user()
            .returning(move |id| Ok(lookup.iter().find(|u| u.id == id).cloned()));
        directory
            .expect_find_users()
            .returning(move |ids| Ok(users.iter().filter(|u| ids.contains(&u.id)).cloned().collect()));
        directory
    }

    fn service(store: MockAppointmentStore, directory: MockUserDirectory) -> AppointmentBookingService {
        AppointmentBookingService::with_stores(
            Arc::new(store),
            Arc::new(directory),
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn booking(doctor: &User, date: &str, time: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor: Some(doctor.id.to_string()),
            date: Some(date.to_string()),
            time: Some(time.to_string()),
            notes: Some("first visit".to_string()),
            patient: None,
        }
    }

    fn stored(new: NewAppointment) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            date: new.date,
            time: new.time,
            notes: new.notes,
            status: new.status,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }

    #[tokio::test]
    async fn test_book_appointment_creates_pending_record() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let patient_id = patient.id;

        let mut store = MockAppointmentStore::new();
        store
            .expect_insert()
            .withf(move |new| {
                new.patient_id == patient_id
                    && new.status == AppointmentStatus::Pending
                    && new.date == "2030-06-16"
                    && new.time == "10:00"
                    && new.created_at == now()
            })
            .times(1)
            .returning(|new| Ok(stored(new)));

        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));
        let view = svc
            .book_appointment(&patient, booking(&doctor, "2030-06-16", "10:00"), now())
            .await
            .unwrap();

        assert_eq!(view.status, AppointmentStatus::Pending);
        assert_eq!(view.notes, "first visit");
        assert_eq!(view.doctor.unwrap().id, doctor.id);
        assert_eq!(view.patient.unwrap().id, patient.id);
    }

    #[tokio::test]
    async fn test_book_in_the_past_fails_for_every_role() {
        let doctor = user(Role::Doctor);

        for role in [Role::Patient, Role::Doctor, Role::Admin] {
            let requester = user(role);
            let mut store = MockAppointmentStore::new();
            store.expect_insert().never();

            let svc = service(store, directory_with(vec![summary_of(&doctor), summary_of(&requester)]));
            let result = svc
                .book_appointment(&requester, booking(&doctor, "2020-01-01", "09:00"), now())
                .await;

            assert_matches!(result, Err(AppointmentError::PastDateTime));
        }
    }

    #[tokio::test]
    async fn test_book_with_patient_as_doctor_fails() {
        let patient = user(Role::Patient);
        let not_a_doctor = user(Role::Patient);

        let mut store = MockAppointmentStore::new();
        store.expect_insert().never();

        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&not_a_doctor)]));
        let result = svc
            .book_appointment(&patient, booking(&not_a_doctor, "2030-06-16", "10:00"), now())
            .await;

        assert_matches!(result, Err(AppointmentError::InvalidDoctor));
    }

    #[tokio::test]
    async fn test_only_admin_books_for_another_patient() {
        let patient = user(Role::Patient);
        let other = user(Role::Patient);
        let admin = user(Role::Admin);
        let doctor = user(Role::Doctor);

        let mut request = booking(&doctor, "2030-06-16", "10:00");
        request.patient = Some(other.id);

        let mut store = MockAppointmentStore::new();
        store.expect_insert().never();
        let svc = service(store, directory_with(vec![]));
        assert_matches!(
            svc.book_appointment(&patient, request.clone(), now()).await,
            Err(AppointmentError::Forbidden(_))
        );

        let other_id = other.id;
        let mut store = MockAppointmentStore::new();
        store
            .expect_insert()
            .withf(move |new| new.patient_id == other_id)
            .times(1)
            .returning(|new| Ok(stored(new)));
        let svc = service(store, directory_with(vec![summary_of(&other), summary_of(&doctor)]));
        let view = svc.book_appointment(&admin, request, now()).await.unwrap();
        assert_eq!(view.patient_id, other.id);
    }

    #[tokio::test]
    async fn test_list_completes_overdue_and_survives_write_failure() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let overdue = appointment(&patient, &doctor, -Duration::hours(3), AppointmentStatus::Pending);
        let upcoming = appointment(&patient, &doctor, Duration::days(1), AppointmentStatus::Confirmed);
        let overdue_id = overdue.id;
        let patient_id = patient.id;

        let mut store = MockAppointmentStore::new();
        let rows = vec![overdue.clone(), upcoming.clone()];
        store
            .expect_list()
            .withf(move |query| {
                query.scope == policy::AppointmentScope::Patient(patient_id) && !query.open_only
            })
            .times(1)
            .returning(move |_| Ok(rows.clone()));
        store
            .expect_update_if_status()
            .with(
                eq(overdue_id),
                eq(OPEN_STATUSES.to_vec()),
                eq(AppointmentPatch::status(AppointmentStatus::Completed, now())),
            )
            .times(1)
            .returning(|_, _, _| Err(anyhow!("store unavailable")));

        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));
        let listing = svc.list_appointments(&patient, now()).await.unwrap();

        assert_eq!(listing.summary.total, 2);
        assert_eq!(listing.summary.completed, 1);
        assert_eq!(listing.summary.upcoming, 1);
        assert_eq!(listing.categorized.completed[0].id, overdue_id);
        assert_eq!(listing.categorized.upcoming[0].id, upcoming.id);
        assert!(listing.categorized.upcoming[0].doctor.is_some());
        assert_eq!(listing.appointments.len(), 2);
    }

    #[tokio::test]
    async fn test_list_keeps_status_settled_before_completion() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let overdue = appointment(&patient, &doctor, -Duration::hours(1), AppointmentStatus::Pending);
        let overdue_id = overdue.id;
        let cancelled = Appointment {
            status: AppointmentStatus::Cancelled,
            ..overdue.clone()
        };

        let mut store = MockAppointmentStore::new();
        store
            .expect_list()
            .times(1)
            .returning(move |_| Ok(vec![overdue.clone()]));
        store
            .expect_update_if_status()
            .times(1)
            .returning(|_, _, _| Ok(None));
        store
            .expect_find_by_id()
            .with(eq(overdue_id))
            .times(1)
            .returning(move |_| Ok(Some(cancelled.clone())));
        store.expect_update().never();

        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));
        let listing = svc.list_appointments(&doctor, now()).await.unwrap();

        assert_eq!(listing.summary.completed, 0);
        assert_eq!(listing.summary.cancelled, 1);
        assert_eq!(listing.categorized.cancelled[0].id, overdue_id);
    }

    #[tokio::test]
    async fn test_admin_lists_everything() {
        let admin = user(Role::Admin);
        let mut store = MockAppointmentStore::new();
        store
            .expect_list()
            .withf(|query| query.scope == policy::AppointmentScope::All)
            .returning(|_| Ok(vec![]));

        let svc = service(store, directory_with(vec![]));
        let listing = svc.list_appointments(&admin, now()).await.unwrap();
        assert_eq!(listing.summary.total, 0);
    }

    #[tokio::test]
    async fn test_upcoming_filters_passed_and_sorts() {
        let doctor = user(Role::Doctor);
        let patient = user(Role::Patient);
        let later = appointment(&patient, &doctor, Duration::days(2), AppointmentStatus::Pending);
        let sooner = appointment(&patient, &doctor, Duration::hours(2), AppointmentStatus::Confirmed);
        let passed = appointment(&patient, &doctor, -Duration::hours(2), AppointmentStatus::Pending);

        let mut store = MockAppointmentStore::new();
        let rows = vec![later.clone(), passed, sooner.clone()];
        store
            .expect_list()
            .withf(|query| query.open_only)
            .returning(move |_| Ok(rows.clone()));
        store.expect_update().never();

        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));
        let upcoming = svc.upcoming_appointments(&doctor, now()).await.unwrap();

        let ids: Vec<Uuid> = upcoming.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![sooner.id, later.id]);
    }

    #[tokio::test]
    async fn test_get_appointment_visibility() {
        let patient = user(Role::Patient);
        let stranger = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let appt = appointment(&patient, &doctor, Duration::days(1), AppointmentStatus::Pending);
        let appt_id = appt.id;

        let mut store = MockAppointmentStore::new();
        store
            .expect_find_by_id()
            .with(eq(appt_id))
            .returning(move |_| Ok(Some(appt.clone())));
        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));

        assert!(svc.get_appointment(&patient, appt_id).await.is_ok());
        assert!(svc.get_appointment(&doctor, appt_id).await.is_ok());
        assert_matches!(
            svc.get_appointment(&stranger, appt_id).await,
            Err(AppointmentError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn test_get_missing_appointment() {
        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().returning(|_| Ok(None));
        let svc = service(store, directory_with(vec![]));

        assert_matches!(
            svc.get_appointment(&user(Role::Admin), Uuid::new_v4()).await,
            Err(AppointmentError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_doctor_cannot_reschedule() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let other_doctor = user(Role::Doctor);
        let appt = appointment(&patient, &doctor, Duration::days(1), AppointmentStatus::Pending);
        let appt_id = appt.id;

        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().returning(move |_| Ok(Some(appt.clone())));
        store.expect_update().never();
        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));

        for requester in [&doctor, &other_doctor] {
            let result = svc
                .update_appointment(requester, appt_id, booking(&doctor, "2030-06-20", "11:00"), now())
                .await;
            assert_matches!(result, Err(AppointmentError::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn test_reschedule_keeps_notes_when_omitted() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let appt = appointment(&patient, &doctor, Duration::days(1), AppointmentStatus::Confirmed);
        let appt_id = appt.id;
        let existing = appt.clone();

        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().returning(move |_| Ok(Some(appt.clone())));
        store
            .expect_update()
            .withf(move |id, patch| {
                *id == appt_id
                    && patch.notes.is_none()
                    && patch.status.is_none()
                    && patch.date.as_deref() == Some("2030-06-20")
            })
            .times(1)
            .returning(move |_, patch| {
                Ok(Some(Appointment {
                    date: patch.date.unwrap_or_default(),
                    time: patch.time.unwrap_or_default(),
                    updated_at: patch.updated_at,
                    ..existing.clone()
                }))
            });
        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));

        let mut request = booking(&doctor, "2030-06-20", "11:00");
        request.notes = None;
        let view = svc.update_appointment(&patient, appt_id, request, now()).await.unwrap();

        assert_eq!(view.notes, "checkup");
        assert_eq!(view.time, "11:00");
        assert_eq!(view.patient_id, patient.id);
    }

    #[tokio::test]
    async fn test_reschedule_terminal_is_conflict() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let appt = appointment(&patient, &doctor, Duration::days(1), AppointmentStatus::Cancelled);
        let appt_id = appt.id;

        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().returning(move |_| Ok(Some(appt.clone())));
        store.expect_update().never();
        let svc = service(store, directory_with(vec![]));

        let result = svc
            .update_appointment(&patient, appt_id, booking(&doctor, "2030-06-20", "11:00"), now())
            .await;
        assert_matches!(result, Err(AppointmentError::TerminalStatus(AppointmentStatus::Cancelled)));
    }

    #[tokio::test]
    async fn test_update_status_rejects_unknown_status() {
        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().never();
        let svc = service(store, directory_with(vec![]));
        let admin = user(Role::Admin);

        assert_matches!(
            svc.update_status(&admin, Uuid::new_v4(), Some("done"), now()).await,
            Err(AppointmentError::InvalidStatus(_))
        );
        assert_matches!(
            svc.update_status(&admin, Uuid::new_v4(), None, now()).await,
            Err(AppointmentError::InvalidStatus(_))
        );
    }

    #[tokio::test]
    async fn test_patient_status_rules() {
        let patient = user(Role::Patient);
        let stranger = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let own = appointment(&patient, &doctor, Duration::days(1), AppointmentStatus::Pending);
        let own_id = own.id;
        let cancelled = Appointment {
            status: AppointmentStatus::Cancelled,
            ..own.clone()
        };

        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().returning(move |_| Ok(Some(own.clone())));
        store
            .expect_update()
            .withf(|_, patch| patch.status == Some(AppointmentStatus::Cancelled))
            .times(1)
            .returning(move |_, _| Ok(Some(cancelled.clone())));
        let svc = service(store, directory_with(vec![summary_of(&patient), summary_of(&doctor)]));

        assert_matches!(
            svc.update_status(&stranger, own_id, Some("confirmed"), now()).await,
            Err(AppointmentError::Forbidden(_))
        );
        assert_matches!(
            svc.update_status(&patient, own_id, Some("confirmed"), now()).await,
            Err(AppointmentError::Forbidden(_))
        );
        let view = svc
            .update_status(&patient, own_id, Some("cancelled"), now())
            .await
            .unwrap();
        assert_eq!(view.status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_already_completed_is_conflict() {
        let patient = user(Role::Patient);
        let doctor = user(Role::Doctor);
        let appt = appointment(&patient, &doctor, -Duration::days(1), AppointmentStatus::Completed);
        let appt_id = appt.id;

        let mut store = MockAppointmentStore::new();
        store.expect_find_by_id().returning(move |_| Ok(Some(appt.clone())));
        store.expect_update().never();
        let svc = service(store, directory_with(vec![]));

        for requester in [&patient, &doctor, &user(Role::Admin)] {
            assert_matches!(
                svc.cancel_appointment(requester, appt_id, now()).await,
                Err(AppointmentError::TerminalStatus(AppointmentStatus::Completed))
            );
        }
    }
}
