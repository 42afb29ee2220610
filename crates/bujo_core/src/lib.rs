//! Core domain logic for the bullet journal.
//! This crate is the single source of truth for item, bucket, and migration
//! rules.

pub mod calendar;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use calendar::{
    bucket_for, created_on, date_for_bucket, display_label, is_future, is_past, is_today,
    is_tomorrow, Bucket, Clock, FixedClock, SystemClock,
};
pub use config::{BackendConfig, ConfigError, JournalConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::item::{Item, ItemId, ItemPatch, ItemType, ItemValidationError};
pub use repo::item_repo::{
    ChangeKind, ChangeListener, ItemChange, ItemRepository, RepoError, RepoResult,
};
pub use repo::local_file_repo::LocalFileItemRepository;
pub use repo::sqlite_repo::SqliteItemRepository;
pub use service::item_store::{
    BucketCounts, DropOutcome, DropTarget, ItemStore, StoreError, StoreResult, TodayView,
    ToggleOutcome,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
