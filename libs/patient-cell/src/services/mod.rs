pub mod patient;

pub use patient::PatientPortalService;
