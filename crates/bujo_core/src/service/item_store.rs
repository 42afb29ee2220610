//! Item store and daily migration engine.
//!
//! # Responsibility
//! - Own the authoritative in-memory item collection.
//! - Provide create/update/delete/toggle/move/reorder/migrate entry points.
//! - Keep per-bucket ordering and run the daily forward-migration sweep.
//!
//! # Invariants
//! - Every mutation is validated, written through the repository, and only
//!   then applied in memory. A failed write leaves memory untouched, except
//!   that an item the backend reports missing is dropped from memory too.
//! - Multi-item writes (reorder, migrate) go through one repository batch.
//! - Bucket membership is derived from `date` and the clock on every read.

use crate::calendar::{
    bucket_for, created_on, date_for_bucket, is_past, is_today, Bucket, Clock, SystemClock,
};
use crate::model::item::{Item, ItemId, ItemPatch, ItemType, ItemValidationError};
use crate::repo::item_repo::{ItemRepository, RepoError};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from item store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Operation referenced an id absent from the collection.
    NotFound(ItemId),
    /// Request violates an item rule; nothing was changed.
    InvalidInput(String),
    /// Backend read/write failure; in-memory state was preserved.
    Storage(RepoError),
}

impl StoreError {
    /// Only storage failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::NotFound(_) | Self::InvalidInput(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::InvalidInput(err.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<ItemValidationError> for StoreError {
    fn from(value: ItemValidationError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

/// Which items the today view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodayView {
    /// Only items dated exactly today.
    Strict,
    /// Items dated today plus items authored today, whatever their date.
    #[default]
    Inclusive,
}

/// Result of `ItemStore::toggle_complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Toggled(Item),
    /// Item kind has no completion state; nothing changed.
    Declined,
}

/// Where a dragged item was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty area of a bucket column.
    Bucket(Bucket),
    /// On top of another item.
    Item(ItemId),
}

/// Result of `ItemStore::resolve_drop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Moved(Item),
    Reordered,
    Unchanged,
}

/// Item counts per bucket, with the today count following a `TodayView`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub today: usize,
    pub tomorrow: usize,
    pub future: usize,
}

/// Authoritative item collection bound to one storage backend.
pub struct ItemStore<R: ItemRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    items: Vec<Item>,
}

impl<R: ItemRepository> ItemStore<R> {
    /// Loads the full collection from `repo`.
    pub fn load(repo: R, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let items = repo.list_items().map_err(StoreError::Storage)?;
        info!(
            "event=store_load module=store status=ok count={}",
            items.len()
        );
        Ok(Self { repo, clock, items })
    }

    /// Loads the collection using the local wall clock.
    pub fn with_system_clock(repo: R) -> StoreResult<Self> {
        Self::load(repo, Arc::new(SystemClock))
    }

    /// Replaces the in-memory collection with the backend's current state.
    ///
    /// Intended for change notifications from push-capable backends.
    pub fn refresh(&mut self) -> StoreResult<()> {
        let items = self
            .repo
            .list_items()
            .map_err(|err| fail("store_refresh", StoreError::Storage(err)))?;
        debug!(
            "event=store_refresh module=store status=ok count={}",
            items.len()
        );
        self.items = items;
        Ok(())
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// All items in backend order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Bucket `item` falls in right now.
    pub fn bucket_of(&self, item: &Item) -> Bucket {
        bucket_for(item.date, self.today())
    }

    /// Creates a new item at the end of its date's bucket.
    ///
    /// # Errors
    /// - `InvalidInput` for blank content, or when the bucket has no order index left.
    /// - `Storage` when the backend rejects the insert.
    pub fn create(
        &mut self,
        content: impl Into<String>,
        kind: ItemType,
        date: NaiveDate,
    ) -> StoreResult<Item> {
        let today = self.today();
        let bucket = bucket_for(date, today);
        let order_index = self
            .next_order_index(bucket, None, today)
            .map_err(|err| fail("item_create", err))?;
        let item = Item::new(kind, content, date, order_index, self.clock.now_epoch_ms())
            .map_err(|err| fail("item_create", err.into()))?;

        self.repo
            .insert_item(&item)
            .map_err(|err| fail("item_create", err.into()))?;
        self.items.push(item.clone());

        info!(
            "event=item_create module=store status=ok item_id={} kind={} bucket={} order_index={}",
            item.id,
            item.kind.as_str(),
            bucket,
            item.order_index
        );
        Ok(item)
    }

    /// Merges `patch` into one item and refreshes `updated_at`.
    ///
    /// An empty or no-op patch still refreshes the timestamp.
    ///
    /// # Errors
    /// - `NotFound` when `id` is absent.
    /// - `InvalidInput` for blank content, completing a note, or replacing an
    ///   already recorded `original_date`.
    pub fn update(&mut self, id: ItemId, patch: &ItemPatch) -> StoreResult<Item> {
        let current = self.find(id).map_err(|err| fail("item_update", err))?;

        if patch.completed == Some(true) && !current.kind.is_completable() {
            return Err(fail(
                "item_update",
                ItemValidationError::NoteCannotBeCompleted.into(),
            ));
        }
        if let (Some(existing), Some(requested)) = (current.original_date, patch.original_date) {
            if requested != Some(existing) {
                return Err(fail(
                    "item_update",
                    StoreError::InvalidInput(format!(
                        "original_date is already recorded as {existing}"
                    )),
                ));
            }
        }

        let mut next = patch.apply_to(current);
        next.touch(self.clock.now_epoch_ms());
        next.validate()
            .map_err(|err| fail("item_update", err.into()))?;

        self.persist("item_update", vec![next.clone()])?;
        info!(
            "event=item_update module=store status=ok item_id={} fields={}",
            id,
            patch_field_names(patch)
        );
        Ok(next)
    }

    /// Hard-deletes one item and returns it.
    ///
    /// # Errors
    /// - `NotFound` when `id` is absent; the collection is unchanged.
    /// - `NotFound` when the backend already lost the row; the stale entry
    ///   is dropped from memory as well.
    pub fn delete(&mut self, id: ItemId) -> StoreResult<Item> {
        let index = self.position(id).map_err(|err| fail("item_delete", err))?;
        if let Err(err) = self.repo.remove_item(id) {
            self.forget_if_missing(&err);
            return Err(fail("item_delete", err.into()));
        }
        let removed = self.items.remove(index);

        info!("event=item_delete module=store status=ok item_id={id}");
        Ok(removed)
    }

    /// Flips `completed` on tasks and events. Notes are declined untouched.
    pub fn toggle_complete(&mut self, id: ItemId) -> StoreResult<ToggleOutcome> {
        let current = self.find(id).map_err(|err| fail("item_toggle", err))?;
        if !current.kind.is_completable() {
            debug!("event=item_toggle module=store status=declined item_id={id} kind=note");
            return Ok(ToggleOutcome::Declined);
        }

        let mut next = current.clone();
        next.completed = !next.completed;
        next.touch(self.clock.now_epoch_ms());

        self.persist("item_toggle", vec![next.clone()])?;
        info!(
            "event=item_toggle module=store status=ok item_id={} completed={}",
            id, next.completed
        );
        Ok(ToggleOutcome::Toggled(next))
    }

    /// Re-dates one item and appends it to the end of its new bucket.
    ///
    /// `migrated` and `original_date` are left as they are.
    pub fn move_item(&mut self, id: ItemId, new_date: NaiveDate) -> StoreResult<Item> {
        let current = self.find(id).map_err(|err| fail("item_move", err))?;
        let today = self.today();
        let destination = bucket_for(new_date, today);

        let mut next = current.clone();
        next.date = new_date;
        next.order_index = self
            .next_order_index(destination, Some(id), today)
            .map_err(|err| fail("item_move", err))?;
        next.touch(self.clock.now_epoch_ms());

        self.persist("item_move", vec![next.clone()])?;
        info!(
            "event=item_move module=store status=ok item_id={} bucket={} order_index={}",
            id, destination, next.order_index
        );
        Ok(next)
    }

    /// Assigns `order_index = position` to each listed id, in list order.
    ///
    /// Unlisted items keep their index. All changes are written as one batch.
    /// For `Bucket::Today`, items authored today count as members even when
    /// dated later, so the inclusive today view can be reordered as shown.
    ///
    /// # Errors
    /// - `NotFound` when any id is absent.
    /// - `InvalidInput` for duplicate ids or ids outside `bucket`.
    pub fn reorder_items(&mut self, ordered_ids: &[ItemId], bucket: Bucket) -> StoreResult<()> {
        let today = self.today();
        let now_ms = self.clock.now_epoch_ms();
        let mut seen = HashSet::with_capacity(ordered_ids.len());
        let mut updates = Vec::new();

        for (position, id) in ordered_ids.iter().copied().enumerate() {
            if !seen.insert(id) {
                return Err(fail(
                    "items_reorder",
                    StoreError::InvalidInput(format!("duplicate item id in ordering: {id}")),
                ));
            }
            let current = self.find(id).map_err(|err| fail("items_reorder", err))?;
            if !in_reorder_scope(current, bucket, today) {
                return Err(fail(
                    "items_reorder",
                    StoreError::InvalidInput(format!("item {id} is not in bucket {bucket}")),
                ));
            }

            let order_index = position as i64;
            if current.order_index != order_index {
                let mut next = current.clone();
                next.order_index = order_index;
                next.touch(now_ms);
                updates.push(next);
            }
        }

        let changed = updates.len();
        if changed > 0 {
            self.persist("items_reorder", updates)?;
        }
        info!(
            "event=items_reorder module=store status=ok bucket={} listed={} changed={}",
            bucket,
            ordered_ids.len(),
            changed
        );
        Ok(())
    }

    /// Carries every overdue incomplete task forward to today.
    ///
    /// Records the first scheduled date in `original_date` once, marks the
    /// item migrated, and returns the affected ids. Running it again on the
    /// same day changes nothing.
    pub fn migrate_old_items(&mut self) -> StoreResult<Vec<ItemId>> {
        let today = self.today();
        let now_ms = self.clock.now_epoch_ms();

        let updates: Vec<Item> = self
            .items
            .iter()
            .filter(|item| {
                item.is_open_task() && is_past(item.date, today) && !is_today(item.date, today)
            })
            .map(|item| {
                let mut next = item.clone();
                next.original_date = item.original_date.or(Some(item.date));
                next.date = today;
                next.migrated = true;
                next.touch(now_ms);
                next
            })
            .collect();

        if updates.is_empty() {
            debug!("event=items_migrate module=store status=ok count=0");
            return Ok(Vec::new());
        }

        let ids: Vec<ItemId> = updates.iter().map(|item| item.id).collect();
        self.persist("items_migrate", updates)?;
        info!(
            "event=items_migrate module=store status=ok count={} today={}",
            ids.len(),
            today
        );
        Ok(ids)
    }

    /// Items currently in `bucket`, ascending by `order_index`.
    pub fn get_items_by_category(&self, bucket: Bucket) -> Vec<Item> {
        let today = self.today();
        self.sorted(|item| bucket_for(item.date, today) == bucket)
    }

    /// Items for the today column under the given view mode.
    pub fn today_items(&self, view: TodayView) -> Vec<Item> {
        let today = self.today();
        match view {
            TodayView::Strict => self.sorted(|item| is_today(item.date, today)),
            TodayView::Inclusive => self.sorted(|item| {
                is_today(item.date, today) || created_on(item.created_at, today)
            }),
        }
    }

    pub fn bucket_counts(&self, view: TodayView) -> BucketCounts {
        BucketCounts {
            today: self.today_items(view).len(),
            tomorrow: self.get_items_by_category(Bucket::Tomorrow).len(),
            future: self.get_items_by_category(Bucket::Future).len(),
        }
    }

    /// Applies a drag-and-drop release.
    ///
    /// Dropping on a bucket column moves the item there unless it is already
    /// in that bucket. Dropping on another item reorders when both share a
    /// bucket and moves into the other item's bucket otherwise.
    pub fn resolve_drop(&mut self, active_id: ItemId, target: DropTarget) -> StoreResult<DropOutcome> {
        let today = self.today();
        let active_bucket = {
            let active = self.find(active_id).map_err(|err| fail("item_drop", err))?;
            bucket_for(active.date, today)
        };

        match target {
            DropTarget::Bucket(bucket) if bucket == active_bucket => Ok(DropOutcome::Unchanged),
            DropTarget::Bucket(bucket) => {
                let moved = self.move_item(active_id, date_for_bucket(bucket, today))?;
                Ok(DropOutcome::Moved(moved))
            }
            DropTarget::Item(over_id) => {
                let over_bucket = {
                    let over = self.find(over_id).map_err(|err| fail("item_drop", err))?;
                    bucket_for(over.date, today)
                };
                if over_bucket != active_bucket {
                    let moved = self.move_item(active_id, date_for_bucket(over_bucket, today))?;
                    return Ok(DropOutcome::Moved(moved));
                }

                let mut ids: Vec<ItemId> = self
                    .get_items_by_category(active_bucket)
                    .into_iter()
                    .map(|item| item.id)
                    .collect();
                let from = ids.iter().position(|id| *id == active_id);
                let to = ids.iter().position(|id| *id == over_id);
                match (from, to) {
                    (Some(from), Some(to)) if from != to => {
                        let moved = ids.remove(from);
                        ids.insert(to, moved);
                        self.reorder_items(&ids, active_bucket)?;
                        Ok(DropOutcome::Reordered)
                    }
                    _ => Ok(DropOutcome::Unchanged),
                }
            }
        }
    }

    fn find(&self, id: ItemId) -> StoreResult<&Item> {
        self.get(id).ok_or(StoreError::NotFound(id))
    }

    fn position(&self, id: ItemId) -> StoreResult<usize> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Index one past the largest in `bucket`, or 0 for an empty bucket.
    fn next_order_index(
        &self,
        bucket: Bucket,
        excluding: Option<ItemId>,
        today: NaiveDate,
    ) -> StoreResult<i64> {
        let max = self
            .items
            .iter()
            .filter(|item| Some(item.id) != excluding)
            .filter(|item| bucket_for(item.date, today) == bucket)
            .map(|item| item.order_index)
            .max();
        match max {
            None => Ok(0),
            Some(max) => max.checked_add(1).ok_or_else(|| {
                StoreError::InvalidInput(format!(
                    "bucket {bucket} has no order_index left after {max}; reorder it first"
                ))
            }),
        }
    }

    /// Drops an item the backend no longer has, so memory matches storage.
    fn forget_if_missing(&mut self, err: &RepoError) {
        if let RepoError::NotFound(missing) = err {
            let before = self.items.len();
            self.items.retain(|item| item.id != *missing);
            if self.items.len() != before {
                warn!("event=store_stale_item module=store status=dropped item_id={missing}");
            }
        }
    }

    fn sorted(&self, keep: impl Fn(&Item) -> bool) -> Vec<Item> {
        let mut selected: Vec<Item> = self.items.iter().filter(|&item| keep(item)).cloned().collect();
        selected.sort_by(display_order);
        selected
    }

    /// Writes `updates` as one batch, then mirrors them in memory.
    fn persist(&mut self, event: &'static str, updates: Vec<Item>) -> StoreResult<()> {
        if let Err(err) = self.repo.update_items(&updates) {
            self.forget_if_missing(&err);
            return Err(fail(event, err.into()));
        }
        for update in updates {
            if let Some(slot) = self.items.iter_mut().find(|item| item.id == update.id) {
                *slot = update;
            }
        }
        Ok(())
    }
}

fn in_reorder_scope(item: &Item, bucket: Bucket, today: NaiveDate) -> bool {
    bucket_for(item.date, today) == bucket
        || (bucket == Bucket::Today && created_on(item.created_at, today))
}

fn display_order(a: &Item, b: &Item) -> Ordering {
    a.order_index
        .cmp(&b.order_index)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}

fn patch_field_names(patch: &ItemPatch) -> String {
    let fields = [
        ("content", patch.content.is_some()),
        ("completed", patch.completed.is_some()),
        ("date", patch.date.is_some()),
        ("original_date", patch.original_date.is_some()),
        ("migrated", patch.migrated.is_some()),
        ("order_index", patch.order_index.is_some()),
    ];
    let names: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| *name)
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(",")
    }
}

fn fail(event: &'static str, err: StoreError) -> StoreError {
    warn!(
        "event={} module=store status=error error_code={} error={}",
        event,
        err.code(),
        err
    );
    err
}

#[cfg(test)]
mod tests {
    use super::{patch_field_names, StoreError};
    use crate::model::item::ItemPatch;
    use crate::repo::item_repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn patch_field_names_lists_only_present_fields() {
        let patch = ItemPatch {
            content: Some("x".to_string()),
            order_index: Some(2),
            ..ItemPatch::default()
        };
        assert_eq!(patch_field_names(&patch), "content,order_index");
        assert_eq!(patch_field_names(&ItemPatch::default()), "none");
    }

    #[test]
    fn repo_errors_map_to_store_taxonomy() {
        let id = Uuid::new_v4();
        assert!(matches!(
            StoreError::from(RepoError::NotFound(id)),
            StoreError::NotFound(found) if found == id
        ));
        let storage = StoreError::from(RepoError::InvalidData("bad".to_string()));
        assert!(storage.is_retryable());
        assert!(!StoreError::InvalidInput("x".to_string()).is_retryable());
    }
}
