//! Item storage contract shared by every backend.
//!
//! # Responsibility
//! - Define the persistence operations the item store depends on.
//! - Define repository errors and change notifications.
//!
//! # Invariants
//! - Write paths call `Item::validate()` before touching storage.
//! - `update_items` is all-or-nothing: a missing id aborts the whole batch.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::item::{Item, ItemId, ItemValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence and query errors from item backends.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    NotFound(ItemId),
    InvalidData(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::Io(err) => write!(f, "item storage io failed: {err}"),
            Self::Serialization(err) => write!(f, "item blob is not valid json: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "item repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "item repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "item repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// What happened to one item in a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Removed,
}

/// Notification pushed to subscribers after a write is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemChange {
    pub kind: ChangeKind,
    pub item_id: ItemId,
}

/// Callback invoked once per committed item change.
pub type ChangeListener = Box<dyn Fn(&ItemChange) + Send>;

/// Storage backend used by `ItemStore`.
pub trait ItemRepository {
    /// Loads the full collection.
    fn list_items(&self) -> RepoResult<Vec<Item>>;
    /// Persists one new item.
    fn insert_item(&self, item: &Item) -> RepoResult<ItemId>;
    /// Replaces every listed item atomically.
    fn update_items(&self, items: &[Item]) -> RepoResult<()>;
    /// Hard-deletes one item.
    fn remove_item(&self, id: ItemId) -> RepoResult<()>;

    /// Registers a change listener.
    ///
    /// Returns `Ok(false)` when the backend has no push notifications.
    fn subscribe(&self, _listener: ChangeListener) -> RepoResult<bool> {
        Ok(false)
    }
}

impl<R: ItemRepository + ?Sized> ItemRepository for &R {
    fn list_items(&self) -> RepoResult<Vec<Item>> {
        (**self).list_items()
    }

    fn insert_item(&self, item: &Item) -> RepoResult<ItemId> {
        (**self).insert_item(item)
    }

    fn update_items(&self, items: &[Item]) -> RepoResult<()> {
        (**self).update_items(items)
    }

    fn remove_item(&self, id: ItemId) -> RepoResult<()> {
        (**self).remove_item(id)
    }

    fn subscribe(&self, listener: ChangeListener) -> RepoResult<bool> {
        (**self).subscribe(listener)
    }
}
