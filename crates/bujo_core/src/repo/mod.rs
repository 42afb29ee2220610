//! Item storage contract and backend implementations.
//!
//! # Responsibility
//! - Define the use-case oriented storage contract (`ItemRepository`).
//! - Isolate SQL and file-format details from the item store.
//!
//! # Invariants
//! - Backends are chosen explicitly at construction, never inferred.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   transport errors.

pub mod item_repo;
pub mod local_file_repo;
pub mod sqlite_repo;
