use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::store::{StoreError, Tables};

/// JSON file holding the whole entity store.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Tables>, StoreError> {
        if !fs::try_exists(&self.path).await.map_err(persistence)? {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path).await.map_err(persistence)?;
        let tables = serde_json::from_str(&data)
            .map_err(|e| StoreError::Persistence(format!("corrupt snapshot {:?}: {}", self.path, e)))?;
        Ok(Some(tables))
    }

    /// Writes to a sibling temp file first and renames it over the snapshot,
    /// so a crash mid-write never leaves a truncated file behind.
    pub async fn write(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(persistence)?;
        }

        let data = serde_json::to_string(tables).map_err(|e| StoreError::Persistence(e.to_string()))?;
        let temp_file = self.path.with_extension("tmp");
        fs::write(&temp_file, data).await.map_err(persistence)?;
        fs::rename(&temp_file, &self.path).await.map_err(persistence)?;

        debug!("Snapshot written to {:?}", self.path);
        Ok(())
    }
}

fn persistence(err: std::io::Error) -> StoreError {
    StoreError::Persistence(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStore;
    use chrono::NaiveDate;
    use shared_models::entities::Department;

    #[tokio::test]
    async fn committed_transactions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("hospital.json");
        let created_at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

        let store = EntityStore::open(&path).await.unwrap();
        store
            .transaction(|t| {
                t.insert_department(Department {
                    id: 0,
                    name: "Neurology".into(),
                    description: None,
                    created_at,
                })
                .map(|_| ())
            })
            .await
            .unwrap();
        assert!(path.exists());

        let reopened = EntityStore::open(&path).await.unwrap();
        let name = reopened
            .read(|t| t.departments().next().map(|d| d.name.clone()))
            .await;
        assert_eq!(name.as_deref(), Some("Neurology"));
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = EntityStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
    }
}
