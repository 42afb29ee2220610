//! Journal item domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by task/note/event bullets.
//! - Provide partial-update merge and validation helpers.
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - `ItemType::Note` items are never completed.
//! - `original_date` is only present on migrated items.
//! - `updated_at` is never earlier than `created_at`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every journal item.
pub type ItemId = Uuid;

/// Bullet category. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Actionable bullet; the only kind carried forward by daily migration.
    Task,
    /// Free-form observation. Cannot be completed.
    Note,
    /// Something scheduled or that happened on the day.
    Event,
}

impl ItemType {
    /// Returns whether items of this kind carry a completion flag.
    pub fn is_completable(self) -> bool {
        matches!(self, Self::Task | Self::Event)
    }

    /// Stable lowercase name used by storage and wire formats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Note => "note",
            Self::Event => "event",
        }
    }

    /// Parses the stable lowercase name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task" => Some(Self::Task),
            "note" => Some(Self::Note),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Model-level rule violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    NilId,
    BlankContent,
    NoteCannotBeCompleted,
    OriginalDateWithoutMigration,
    UpdatedBeforeCreated { created_at: i64, updated_at: i64 },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "item id must not be nil"),
            Self::BlankContent => write!(f, "item content must not be blank"),
            Self::NoteCannotBeCompleted => write!(f, "note items cannot be completed"),
            Self::OriginalDateWithoutMigration => {
                write!(f, "original_date is only valid on migrated items")
            }
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) must be >= created_at ({created_at})"
            ),
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical journal record.
///
/// Bucket placement is not stored here; it is derived from `date` and the
/// current day at read time (see `calendar::bucket_for`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItem")]
pub struct Item {
    pub id: ItemId,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub content: String,
    /// Meaningful only for tasks and events.
    pub completed: bool,
    /// Target day, no time component.
    pub date: NaiveDate,
    /// Day the item was first scheduled for, recorded on first migration.
    pub original_date: Option<NaiveDate>,
    pub migrated: bool,
    /// Relative position within the item's current bucket.
    pub order_index: i64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Refreshed on every mutation.
    pub updated_at: i64,
}

impl Item {
    /// Creates a fresh, unmigrated item with a generated ID.
    ///
    /// # Errors
    /// - `BlankContent` when `content` is empty after trimming.
    pub fn new(
        kind: ItemType,
        content: impl Into<String>,
        date: NaiveDate,
        order_index: i64,
        now_ms: i64,
    ) -> Result<Self, ItemValidationError> {
        Self::with_id(Uuid::new_v4(), kind, content, date, order_index, now_ms)
    }

    /// Creates a fresh item with a caller-provided ID.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(
        id: ItemId,
        kind: ItemType,
        content: impl Into<String>,
        date: NaiveDate,
        order_index: i64,
        now_ms: i64,
    ) -> Result<Self, ItemValidationError> {
        let item = Self {
            id,
            kind,
            content: content.into(),
            completed: false,
            date,
            original_date: None,
            migrated: false,
            order_index,
            created_at: now_ms,
            updated_at: now_ms,
        };
        item.validate()?;
        Ok(item)
    }

    /// Checks model invariants.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.is_nil() {
            return Err(ItemValidationError::NilId);
        }
        if self.content.trim().is_empty() {
            return Err(ItemValidationError::BlankContent);
        }
        if self.completed && !self.kind.is_completable() {
            return Err(ItemValidationError::NoteCannotBeCompleted);
        }
        if self.original_date.is_some() && !self.migrated {
            return Err(ItemValidationError::OriginalDateWithoutMigration);
        }
        if self.updated_at < self.created_at {
            return Err(ItemValidationError::UpdatedBeforeCreated {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Returns whether this is an incomplete task, i.e. migration backlog.
    pub fn is_open_task(&self) -> bool {
        self.kind == ItemType::Task && !self.completed
    }

    /// Refreshes `updated_at`, never moving it behind `created_at`.
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms.max(self.created_at);
    }
}

/// Partial update applied by `ItemStore::update`.
///
/// `None` leaves the field untouched. `original_date` uses a nested option so
/// callers can distinguish "leave" from "set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub content: Option<String>,
    pub completed: Option<bool>,
    pub date: Option<NaiveDate>,
    pub original_date: Option<Option<NaiveDate>>,
    pub migrated: Option<bool>,
    pub order_index: Option<i64>,
}

impl ItemPatch {
    pub fn content(value: impl Into<String>) -> Self {
        Self {
            content: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Self::default()
        }
    }

    pub fn date(value: NaiveDate) -> Self {
        Self {
            date: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns a copy of `item` with this patch merged in.
    ///
    /// Does not validate or touch timestamps; callers do both.
    pub fn apply_to(&self, item: &Item) -> Item {
        let mut next = item.clone();
        if let Some(content) = &self.content {
            next.content = content.clone();
        }
        if let Some(completed) = self.completed {
            next.completed = completed;
        }
        if let Some(date) = self.date {
            next.date = date;
        }
        if let Some(original_date) = self.original_date {
            next.original_date = original_date;
        }
        if let Some(migrated) = self.migrated {
            next.migrated = migrated;
        }
        if let Some(order_index) = self.order_index {
            next.order_index = order_index;
        }
        next
    }
}

#[derive(Deserialize)]
struct RawItem {
    id: ItemId,
    #[serde(rename = "type")]
    kind: ItemType,
    content: String,
    #[serde(default)]
    completed: bool,
    date: NaiveDate,
    #[serde(default)]
    original_date: Option<NaiveDate>,
    #[serde(default)]
    migrated: bool,
    #[serde(default)]
    order_index: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<RawItem> for Item {
    type Error = ItemValidationError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let item = Self {
            id: raw.id,
            kind: raw.kind,
            content: raw.content,
            completed: raw.completed,
            date: raw.date,
            original_date: raw.original_date,
            migrated: raw.migrated,
            order_index: raw.order_index,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        };
        item.validate()?;
        Ok(item)
    }
}
