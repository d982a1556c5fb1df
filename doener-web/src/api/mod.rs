//! HTTP API handlers for doener-web

pub mod admin;
pub mod buildinfo;
pub mod error;
pub mod favorites;
pub mod files;
pub mod health;
pub mod identity;
pub mod place_link;
pub mod restaurants;
pub mod reviews;
pub mod search;

pub use buildinfo::get_build_info;
pub use error::ApiError;
pub use health::health_routes;
pub use identity::{identity_middleware, require_admin, CurrentUser, USER_ID_HEADER};
