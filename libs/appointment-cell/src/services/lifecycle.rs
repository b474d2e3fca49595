// libs/appointment-cell/src/services/lifecycle.rs
use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, CategorizedAppointments};

/// Pure time-based rules. `now` is always supplied by the caller.
pub struct AppointmentLifecycleService {
    clinic_offset: FixedOffset,
}

impl AppointmentLifecycleService {
    pub fn new(clinic_offset: FixedOffset) -> Self {
        Self { clinic_offset }
    }

    pub fn effective_instant(&self, appointment: &Appointment) -> Option<DateTime<Utc>> {
        appointment.effective_instant(self.clinic_offset)
    }

    /// Splits appointments into four disjoint buckets. First match wins:
    /// cancelled, completed, upcoming (instant >= now), past. Appointments
    /// without a valid instant are past. Upcoming is soonest first, past is
    /// most recent first with undated entries last.
    pub fn categorize(
        &self,
        appointments: Vec<Appointment>,
        now: DateTime<Utc>,
    ) -> CategorizedAppointments<Appointment> {
        let mut upcoming = Vec::new();
        let mut past = Vec::new();
        let mut categorized = CategorizedAppointments::default();

        for appointment in appointments {
            let instant = self.effective_instant(&appointment);

            match appointment.status {
                AppointmentStatus::Cancelled => categorized.cancelled.push(appointment),
                AppointmentStatus::Completed => categorized.completed.push(appointment),
                _ => match instant {
                    Some(at) if at >= now => upcoming.push((at, appointment)),
                    _ => past.push((instant, appointment)),
                },
            }
        }

        upcoming.sort_by_key(|(at, _)| *at);
        past.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        categorized.upcoming = upcoming.into_iter().map(|(_, appt)| appt).collect();
        categorized.past = past.into_iter().map(|(_, appt)| appt).collect();

        debug!(
            "Categorized appointments: {} upcoming, {} past, {} completed, {} cancelled",
            categorized.upcoming.len(),
            categorized.past.len(),
            categorized.completed.len(),
            categorized.cancelled.len()
        );

        categorized
    }

    /// Open appointments whose instant is strictly before `now`.
    pub fn overdue_appointments(&self, appointments: &[Appointment], now: DateTime<Utc>) -> Vec<Uuid> {
        appointments
            .iter()
            .filter(|appt| {
                matches!(appt.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
                    && self.effective_instant(appt).is_some_and(|at| at < now)
            })
            .map(|appt| appt.id)
            .collect()
    }

    /// Marks overdue appointments completed in memory and returns their ids.
    /// Running it again on the result is a no-op.
    pub fn auto_complete_overdue(&self, appointments: &mut [Appointment], now: DateTime<Utc>) -> Vec<Uuid> {
        let overdue = self.overdue_appointments(appointments, now);

        for appointment in appointments.iter_mut().filter(|appt| overdue.contains(&appt.id)) {
            appointment.status = AppointmentStatus::Completed;
            appointment.updated_at = now;
        }

        overdue
    }

    pub fn is_upcoming(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        !appointment.is_terminal() && self.effective_instant(appointment).is_some_and(|at| at >= now)
    }
}
