pub mod doctor;

pub use doctor::DoctorPortalService;
