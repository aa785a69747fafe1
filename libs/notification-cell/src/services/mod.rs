pub mod export;
pub mod jobs;
pub mod reports;
