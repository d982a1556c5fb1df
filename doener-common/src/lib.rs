//! # Döner Common Library
//!
//! Shared code for the döner review service including:
//! - Review and restaurant models with enumerated attribute values
//! - Attribute tallies and majority resolution
//! - SQLite stores for restaurants, reviews, users and files
//! - Configuration loading and root folder resolution
//! - Signed file URL resolution
//! - Shared map link parsing

pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod models;
pub mod place_link;
pub mod tally;

pub use error::{Error, Result};
pub use files::FileUrlResolver;
pub use tally::Tally;
