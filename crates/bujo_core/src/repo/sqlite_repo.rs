//! SQLite-backed item repository.
//!
//! # Responsibility
//! - Persist items in the `bullet_items` table.
//! - Push change notifications to subscribers after each commit.
//!
//! # Invariants
//! - Batch updates run in one immediate transaction.
//! - Listing order is deterministic: `order_index, created_at, id`.
//! - Listeners only hear about committed writes.

use crate::db::migrations::latest_version;
use crate::model::item::{Item, ItemId, ItemType};
use crate::repo::item_repo::{
    ChangeKind, ChangeListener, ItemChange, ItemRepository, RepoError, RepoResult,
};
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::cell::RefCell;
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    type,
    content,
    completed,
    date,
    original_date,
    migrated,
    order_index,
    created_at,
    updated_at
FROM bullet_items";

const ITEM_COLUMNS: [&str; 10] = [
    "id",
    "type",
    "content",
    "completed",
    "date",
    "original_date",
    "migrated",
    "order_index",
    "created_at",
    "updated_at",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Durable item backend with in-process change notification.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
    listeners: RefCell<Vec<ChangeListener>>,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Creates a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when schema migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_items_connection_ready(conn)?;
        Ok(Self {
            conn,
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Listeners run while the listener list is borrowed. They are `'static`
    /// and `Send`, so they cannot hold this repository and re-enter it.
    fn notify(&self, kind: ChangeKind, item_id: ItemId) {
        let change = ItemChange { kind, item_id };
        for listener in self.listeners.borrow().iter() {
            listener(&change);
        }
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn list_items(&self) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL} ORDER BY order_index ASC, created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn insert_item(&self, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;

        self.conn.execute(
            "INSERT INTO bullet_items (
                id,
                type,
                content,
                completed,
                date,
                original_date,
                migrated,
                order_index,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                item.id.to_string(),
                item.kind.as_str(),
                item.content.as_str(),
                bool_to_int(item.completed),
                format_date(item.date),
                item.original_date.map(format_date),
                bool_to_int(item.migrated),
                item.order_index,
                item.created_at,
                item.updated_at,
            ],
        )?;

        self.notify(ChangeKind::Inserted, item.id);
        Ok(item.id)
    }

    fn update_items(&self, items: &[Item]) -> RepoResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        for item in items {
            item.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for item in items {
            let changed = tx.execute(
                "UPDATE bullet_items
                 SET
                    content = ?2,
                    completed = ?3,
                    date = ?4,
                    original_date = ?5,
                    migrated = ?6,
                    order_index = ?7,
                    updated_at = ?8
                 WHERE id = ?1
                   AND type = ?9;",
                params![
                    item.id.to_string(),
                    item.content.as_str(),
                    bool_to_int(item.completed),
                    format_date(item.date),
                    item.original_date.map(format_date),
                    bool_to_int(item.migrated),
                    item.order_index,
                    item.updated_at,
                    item.kind.as_str(),
                ],
            )?;
            if changed == 0 {
                // Dropping `tx` rolls back every earlier row in this batch.
                return Err(RepoError::NotFound(item.id));
            }
        }
        tx.commit()?;
        debug!(
            "event=items_update module=repo status=ok backend=sqlite count={}",
            items.len()
        );

        for item in items {
            self.notify(ChangeKind::Updated, item.id);
        }
        Ok(())
    }

    fn remove_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM bullet_items WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        self.notify(ChangeKind::Removed, id);
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) -> RepoResult<bool> {
        self.listeners.borrow_mut().push(listener);
        Ok(true)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in bullet_items.id"))
    })?;

    let type_text: String = row.get("type")?;
    let kind = ItemType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid item type `{type_text}` in bullet_items.type"
        ))
    })?;

    let date_text: String = row.get("date")?;
    let date = parse_date(&date_text, "bullet_items.date")?;
    let original_date = row
        .get::<_, Option<String>>("original_date")?
        .map(|value| parse_date(&value, "bullet_items.original_date"))
        .transpose()?;

    let item = Item {
        id,
        kind,
        content: row.get("content")?,
        completed: int_to_bool(row.get("completed")?, "bullet_items.completed")?,
        date,
        original_date,
        migrated: int_to_bool(row.get("migrated")?, "bullet_items.migrated")?,
        order_index: row.get("order_index")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    item.validate()?;
    Ok(item)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str, column: &'static str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn ensure_items_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "bullet_items")? {
        return Err(RepoError::MissingRequiredTable("bullet_items"));
    }

    for column in ITEM_COLUMNS {
        if !table_has_column(conn, "bullet_items", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "bullet_items",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
