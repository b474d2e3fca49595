pub mod booking;
pub mod lifecycle;
pub mod policy;
pub mod store;
pub mod validation;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
