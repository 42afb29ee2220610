//! Single-device item cache stored as one JSON blob.
//!
//! # Responsibility
//! - Read and write the full item collection as one serialized array.
//!
//! # Invariants
//! - Every write replaces the whole blob through a temp file + rename, so a
//!   failed write leaves the previous blob intact.
//! - A missing or empty file is an empty collection; a corrupt file is an
//!   error, never silently discarded.

use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::{ItemRepository, RepoError, RepoResult};
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default blob file name inside a data directory.
pub const DEFAULT_BLOB_FILE_NAME: &str = "bullet-journal-items.json";

/// Local JSON-file item backend.
#[derive(Debug, Clone)]
pub struct LocalFileItemRepository {
    path: PathBuf,
}

impl LocalFileItemRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Repository using `DEFAULT_BLOB_FILE_NAME` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_BLOB_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> RepoResult<Vec<Item>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&text).map_err(|err| {
            warn!(
                "event=blob_read module=repo status=error backend=local_file error_code=blob_corrupt line={} column={}",
                err.line(),
                err.column()
            );
            RepoError::Serialization(err)
        })
    }

    fn write_all(&self, items: &[Item]) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let payload = serde_json::to_vec_pretty(items)?;
        let staging = self.staging_path();
        fs::write(&staging, payload)?;
        if let Err(err) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }

        debug!(
            "event=blob_write module=repo status=ok backend=local_file count={}",
            items.len()
        );
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|value| value.to_os_string())
            .unwrap_or_else(|| DEFAULT_BLOB_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ItemRepository for LocalFileItemRepository {
    fn list_items(&self) -> RepoResult<Vec<Item>> {
        self.read_all()
    }

    fn insert_item(&self, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;
        let mut items = self.read_all()?;
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(RepoError::InvalidData(format!(
                "item id already exists: {}",
                item.id
            )));
        }
        items.push(item.clone());
        self.write_all(&items)?;
        Ok(item.id)
    }

    fn update_items(&self, updates: &[Item]) -> RepoResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        for item in updates {
            item.validate()?;
        }

        let mut items = self.read_all()?;
        for update in updates {
            let slot = items
                .iter_mut()
                .find(|existing| existing.id == update.id)
                .ok_or(RepoError::NotFound(update.id))?;
            *slot = update.clone();
        }
        self.write_all(&items)
    }

    fn remove_item(&self, id: ItemId) -> RepoResult<()> {
        let mut items = self.read_all()?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(RepoError::NotFound(id));
        }
        self.write_all(&items)
    }
}

#[cfg(test)]
mod tests {
    use super::LocalFileItemRepository;
    use std::path::Path;

    #[test]
    fn staging_path_sits_next_to_blob() {
        let repo = LocalFileItemRepository::new("/data/journal/items.json");
        assert_eq!(
            repo.staging_path(),
            Path::new("/data/journal/items.json.tmp")
        );
    }
}
