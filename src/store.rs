use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::Target;
use crate::utils::error::PersistenceError;

/// The target list as a JSON array on disk. Writers are serialized and each
/// write replaces the file atomically, so readers never see a partial list.
pub struct TargetStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TargetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load. A missing or empty file is an empty list; anything that
    /// does not parse is `Malformed`. Records written without an id get one,
    /// and the file is rewritten so the id sticks. A failed rewrite is only
    /// logged; the parsed list is still returned.
    pub async fn try_load(&self) -> Result<Vec<Target>, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let (targets, assigned_ids) = self.read_file().await?;

        if assigned_ids > 0 {
            info!(
                path = %self.path.display(),
                "Assigned ids to {} stored targets",
                assigned_ids
            );
            if let Err(e) = self.write_file(&targets).await {
                warn!(
                    path = %self.path.display(),
                    "Could not persist assigned ids, they will change on next load: {}",
                    e
                );
            }
        }

        Ok(targets)
    }

    /// First target whose id or name equals `key`.
    pub async fn find(&self, key: &str) -> Result<Option<Target>, PersistenceError> {
        let targets = self.try_load().await?;
        Ok(targets.into_iter().find(|t| t.id == key || t.name == key))
    }

    /// Lenient load: an unreadable list is logged and treated as empty.
    pub async fn load(&self) -> Vec<Target> {
        match self.try_load().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!(path = %self.path.display(), "Could not load targets, starting empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, targets: &[Target]) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.write_file(targets).await
    }

    pub async fn add(&self, target: Target) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let (mut targets, _) = self.read_file().await?;
        targets.push(target);
        self.write_file(&targets).await
    }

    /// Removes the first target whose id or name equals `key`.
    pub async fn remove(&self, key: &str) -> Result<Option<Target>, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let (mut targets, _) = self.read_file().await?;

        let Some(index) = targets.iter().position(|t| t.id == key || t.name == key) else {
            return Ok(None);
        };
        let removed = targets.remove(index);
        self.write_file(&targets).await?;
        Ok(Some(removed))
    }

    /// Read-modify-write of one record. Returns the updated record, or
    /// `None` when no target with `id` is stored any more.
    pub async fn update<F>(&self, id: &str, apply: F) -> Result<Option<Target>, PersistenceError>
    where
        F: FnOnce(&mut Target),
    {
        let _guard = self.write_lock.lock().await;
        let (mut targets, _) = self.read_file().await?;

        let Some(target) = targets.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        apply(target);
        let updated = target.clone();

        self.write_file(&targets).await?;
        Ok(Some(updated))
    }

    async fn read_file(&self) -> Result<(Vec<Target>, usize), PersistenceError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok((Vec::new(), 0));
        }

        let records: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| PersistenceError::Malformed(e.to_string()))?;

        let missing_ids = records
            .iter()
            .filter(|record| {
                record
                    .get("id")
                    .and_then(|id| id.as_str())
                    .is_none_or(str::is_empty)
            })
            .count();

        let targets = records
            .into_iter()
            .map(serde_json::from_value::<Target>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PersistenceError::Malformed(e.to_string()))?;

        Ok((targets, missing_ids))
    }

    async fn write_file(&self, targets: &[Target]) -> Result<(), PersistenceError> {
        let serialized = serde_json::to_string_pretty(targets)
            .map_err(|e| PersistenceError::Malformed(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        tokio::fs::write(&temp_path, serialized).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
