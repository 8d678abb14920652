//! # homeflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` automation registry using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `AutomationRegistry` port defined in `homeflow-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Store each automation as one JSON document keyed by its id
//!
//! ## Dependency rule
//! Depends on `homeflow-app` (for port traits) and `homeflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod registry;

pub use pool::{Config, Database};
pub use registry::SqliteAutomationRegistry;
