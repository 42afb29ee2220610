//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into journal-level operations.
//! - Keep callers decoupled from storage details.

pub mod item_store;
