//! SQLite stores
//!
//! Free functions over a `SqlitePool` (or an open transaction) per table.
//! Review writes recompute the owning restaurant's cached statistics in the
//! same transaction.

pub mod files;
pub mod init;
pub mod migrations;
pub mod restaurants;
pub mod reviews;
pub mod settings;
pub mod users;

pub use init::*;
pub use migrations::run_migrations;
