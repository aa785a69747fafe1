use chrono::NaiveDateTime;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_models::entities::{Department, User};

use crate::store::{EntityStore, StoreError};

pub const DEFAULT_DEPARTMENTS: [(&str, &str); 10] = [
    ("Cardiology", "Diagnosis and treatment of heart and cardiovascular system disorders"),
    ("Neurology", "Diagnosis and treatment of nervous system disorders"),
    ("Orthopedics", "Treatment of musculoskeletal system disorders, bones, joints, and muscles"),
    ("Pediatrics", "Medical care for infants, children, and adolescents"),
    ("Dermatology", "Diagnosis and treatment of skin, hair, and nail conditions"),
    ("General Medicine", "Primary healthcare and treatment of common medical conditions"),
    ("Gynecology", "Healthcare for women, focusing on reproductive system"),
    ("ENT (Otolaryngology)", "Treatment of ear, nose, and throat disorders"),
    ("Ophthalmology", "Diagnosis and treatment of eye and vision problems"),
    ("Psychiatry", "Diagnosis, treatment, and prevention of mental health disorders"),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub admin_created: bool,
    pub departments_created: usize,
}

/// Creates the default admin and departments when they are missing.
/// `admin_password_hash` must already be hashed.
pub async fn seed_defaults(
    store: &EntityStore,
    config: &AppConfig,
    admin_password_hash: &str,
    now: NaiveDateTime,
) -> Result<SeedReport, StoreError> {
    let report = store
        .transaction(|tables| {
            let mut report = SeedReport::default();

            let admin_exists = tables.users().any(|u| u.role == Role::Admin);
            if !admin_exists && tables.user_by_username(&config.admin_username).is_none() {
                tables.insert_user(User {
                    id: 0,
                    username: config.admin_username.clone(),
                    email: config.admin_email.clone(),
                    password_hash: admin_password_hash.to_string(),
                    role: Role::Admin,
                    full_name: config.admin_full_name.clone(),
                    phone: None,
                    address: None,
                    registered_at: now,
                    is_active: true,
                })?;
                report.admin_created = true;
            }

            for (name, description) in DEFAULT_DEPARTMENTS {
                if tables.department_by_name(name).is_some() {
                    debug!("Department '{}' already exists, skipping", name);
                    continue;
                }
                tables.insert_department(Department {
                    id: 0,
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    created_at: now,
                })?;
                report.departments_created += 1;
            }

            Ok::<_, StoreError>(report)
        })
        .await?;

    info!(
        "Seeding finished: admin created = {}, departments created = {}",
        report.admin_created, report.departments_created
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = EntityStore::in_memory();
        let config = AppConfig::default();
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

        let first = seed_defaults(&store, &config, "hashed", now).await.unwrap();
        assert!(first.admin_created);
        assert_eq!(first.departments_created, 10);

        let second = seed_defaults(&store, &config, "hashed", now).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let counts = store.read(|t| t.counts()).await;
        assert_eq!(counts.users, 1);
        assert_eq!(counts.departments, 10);
    }
}
