pub mod models;
pub mod services;

pub use models::AppointmentError;
pub use services::availability::{AvailabilityService, AVAILABILITY_LEAD_DAYS, BOOKING_HORIZON_DAYS};
pub use services::booking::BookingService;
pub use services::lifecycle::LifecycleService;
pub use services::resolver::{AppointmentView, DepartmentSummary, DoctorSummary, PatientSummary, Resolver, TreatmentRecord};
