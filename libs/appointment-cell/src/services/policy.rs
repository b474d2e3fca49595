// libs/appointment-cell/src/services/policy.rs
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Role, User};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Which appointments a requester may list. Applied as a store filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentScope {
    All,
    Doctor(Uuid),
    Patient(Uuid),
}

/// The requester's relationship to one appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Admin,
    AssignedDoctor,
    OwningPatient,
    Unrelated,
}

fn relation(requester: &User, appointment: &Appointment) -> Relation {
    match requester.role {
        Role::Admin => Relation::Admin,
        Role::Doctor if appointment.doctor_id == requester.id => Relation::AssignedDoctor,
        Role::Patient if appointment.patient_id == requester.id => Relation::OwningPatient,
        _ => Relation::Unrelated,
    }
}

pub fn visibility_scope(requester: &User) -> AppointmentScope {
    match requester.role {
        Role::Admin => AppointmentScope::All,
        Role::Doctor => AppointmentScope::Doctor(requester.id),
        Role::Patient => AppointmentScope::Patient(requester.id),
    }
}

pub fn can_view(requester: &User, appointment: &Appointment) -> bool {
    relation(requester, appointment) != Relation::Unrelated
}

pub fn ensure_can_view(requester: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if can_view(requester, appointment) {
        Ok(())
    } else {
        Err(AppointmentError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ))
    }
}

/// Patients book for themselves; only admins may name another patient.
pub fn resolve_booking_patient(requester: &User, requested: Option<Uuid>) -> Result<Uuid, AppointmentError> {
    match requested {
        Some(patient_id) if patient_id != requester.id && requester.role != Role::Admin => {
            Err(AppointmentError::Forbidden(
                "Not authorized to book appointments for another patient".to_string(),
            ))
        }
        Some(patient_id) => Ok(patient_id),
        None => Ok(requester.id),
    }
}

/// Admins and the assigned doctor may set any status. The owning patient may
/// only cancel, and only while the appointment is still open.
pub fn ensure_can_change_status(
    requester: &User,
    appointment: &Appointment,
    new_status: AppointmentStatus,
) -> Result<(), AppointmentError> {
    debug!(
        "Checking status change {} -> {} by {} ({})",
        appointment.status, new_status, requester.id, requester.role
    );

    match relation(requester, appointment) {
        Relation::Admin | Relation::AssignedDoctor => Ok(()),
        Relation::OwningPatient if new_status == AppointmentStatus::Cancelled => {
            if appointment.is_terminal() {
                Err(AppointmentError::TerminalStatus(appointment.status))
            } else {
                Ok(())
            }
        }
        Relation::OwningPatient => Err(AppointmentError::Forbidden(
            "Patients can only cancel their appointments".to_string(),
        )),
        Relation::Unrelated => Err(AppointmentError::Forbidden(
            "Not authorized to change the status of this appointment".to_string(),
        )),
    }
}

/// Schedule edits (doctor, date, time, notes) belong to the owning patient and admins.
pub fn ensure_can_edit(requester: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    match relation(requester, appointment) {
        Relation::Admin | Relation::OwningPatient => {}
        Relation::AssignedDoctor | Relation::Unrelated => {
            return Err(AppointmentError::Forbidden(
                "Not authorized to edit this appointment".to_string(),
            ))
        }
    }

    if appointment.is_terminal() {
        return Err(AppointmentError::TerminalStatus(appointment.status));
    }

    Ok(())
}

pub fn ensure_can_cancel(requester: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if relation(requester, appointment) == Relation::Unrelated {
        return Err(AppointmentError::Forbidden(
            "Not authorized to cancel this appointment".to_string(),
        ));
    }

    if appointment.is_terminal() {
        return Err(AppointmentError::TerminalStatus(appointment.status));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

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

    fn appointment_for(patient: &User, doctor: &User, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            date: "2030-01-01".to_string(),
            time: "10:00".to_string(),
            notes: String::new(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Cast {
        patient: User,
        other_patient: User,
        doctor: User,
        other_doctor: User,
        admin: User,
    }

    fn cast() -> Cast {
        Cast {
            patient: user(Role::Patient),
            other_patient: user(Role::Patient),
            doctor: user(Role::Doctor),
            other_doctor: user(Role::Doctor),
            admin: user(Role::Admin),
        }
    }

    #[test]
    fn test_visibility_scope_per_role() {
        let c = cast();
        assert_eq!(visibility_scope(&c.admin), AppointmentScope::All);
        assert_eq!(visibility_scope(&c.doctor), AppointmentScope::Doctor(c.doctor.id));
        assert_eq!(visibility_scope(&c.patient), AppointmentScope::Patient(c.patient.id));
    }

    #[test]
    fn test_can_view() {
        let c = cast();
        let appt = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Pending);

        assert!(can_view(&c.admin, &appt));
        assert!(can_view(&c.patient, &appt));
        assert!(can_view(&c.doctor, &appt));
        assert!(!can_view(&c.other_patient, &appt));
        assert!(!can_view(&c.other_doctor, &appt));
        assert_matches!(ensure_can_view(&c.other_patient, &appt), Err(AppointmentError::Forbidden(_)));
    }

    #[test]
    fn test_patient_id_that_matches_a_doctor_id_grants_nothing() {
        let c = cast();
        // A doctor who is recorded as the patient of an appointment is still scoped as a doctor.
        let appt = appointment_for(&c.doctor, &c.other_doctor, AppointmentStatus::Pending);
        assert!(!can_view(&c.doctor, &appt));
    }

    #[test]
    fn test_resolve_booking_patient() {
        let c = cast();
        assert_eq!(resolve_booking_patient(&c.patient, None).unwrap(), c.patient.id);
        assert_eq!(resolve_booking_patient(&c.patient, Some(c.patient.id)).unwrap(), c.patient.id);
        assert_matches!(
            resolve_booking_patient(&c.patient, Some(c.other_patient.id)),
            Err(AppointmentError::Forbidden(_))
        );
        assert_eq!(resolve_booking_patient(&c.admin, Some(c.patient.id)).unwrap(), c.patient.id);
    }

    #[test]
    fn test_status_change_by_admin_and_assigned_doctor() {
        let c = cast();
        let appt = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Completed);

        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert!(ensure_can_change_status(&c.admin, &appt, status).is_ok());
            assert!(ensure_can_change_status(&c.doctor, &appt, status).is_ok());
        }
        assert_matches!(
            ensure_can_change_status(&c.other_doctor, &appt, AppointmentStatus::Confirmed),
            Err(AppointmentError::Forbidden(_))
        );
    }

    #[test]
    fn test_patient_may_only_cancel_own_open_appointment() {
        let c = cast();
        let pending = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Pending);

        assert!(ensure_can_change_status(&c.patient, &pending, AppointmentStatus::Cancelled).is_ok());
        assert_matches!(
            ensure_can_change_status(&c.patient, &pending, AppointmentStatus::Confirmed),
            Err(AppointmentError::Forbidden(_))
        );
        assert_matches!(
            ensure_can_change_status(&c.other_patient, &pending, AppointmentStatus::Confirmed),
            Err(AppointmentError::Forbidden(_))
        );
        assert_matches!(
            ensure_can_change_status(&c.other_patient, &pending, AppointmentStatus::Cancelled),
            Err(AppointmentError::Forbidden(_))
        );

        let completed = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Completed);
        assert_matches!(
            ensure_can_change_status(&c.patient, &completed, AppointmentStatus::Cancelled),
            Err(AppointmentError::TerminalStatus(AppointmentStatus::Completed))
        );
    }

    #[test]
    fn test_edit_rules() {
        let c = cast();
        let pending = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Pending);

        assert!(ensure_can_edit(&c.patient, &pending).is_ok());
        assert!(ensure_can_edit(&c.admin, &pending).is_ok());
        assert_matches!(ensure_can_edit(&c.doctor, &pending), Err(AppointmentError::Forbidden(_)));
        assert_matches!(ensure_can_edit(&c.other_doctor, &pending), Err(AppointmentError::Forbidden(_)));
        assert_matches!(ensure_can_edit(&c.other_patient, &pending), Err(AppointmentError::Forbidden(_)));

        let cancelled = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Cancelled);
        assert_matches!(
            ensure_can_edit(&c.patient, &cancelled),
            Err(AppointmentError::TerminalStatus(AppointmentStatus::Cancelled))
        );
        // Permission is decided before the terminal check.
        assert_matches!(ensure_can_edit(&c.other_patient, &cancelled), Err(AppointmentError::Forbidden(_)));
    }

    #[test]
    fn test_cancel_rules() {
        let c = cast();
        let confirmed = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Confirmed);

        assert!(ensure_can_cancel(&c.patient, &confirmed).is_ok());
        assert!(ensure_can_cancel(&c.doctor, &confirmed).is_ok());
        assert!(ensure_can_cancel(&c.admin, &confirmed).is_ok());
        assert_matches!(ensure_can_cancel(&c.other_patient, &confirmed), Err(AppointmentError::Forbidden(_)));
        assert_matches!(ensure_can_cancel(&c.other_doctor, &confirmed), Err(AppointmentError::Forbidden(_)));

        let completed = appointment_for(&c.patient, &c.doctor, AppointmentStatus::Completed);
        assert_matches!(
            ensure_can_cancel(&c.admin, &completed),
            Err(AppointmentError::TerminalStatus(AppointmentStatus::Completed))
        );
    }
}
