//! Fallback file path
//!
//! Without a storage base URL, image URLs point here. The bytes live in
//! external storage, so this service only answers with a JSON 404.

use axum::extract::Path;
use tracing::debug;

use super::ApiError;

/// GET /api/files/*key
pub async fn file_placeholder(Path(key): Path<String>) -> ApiError {
    debug!("File {} requested from fallback path", key);
    ApiError::NotFound(format!("File {} is not served by this service", key))
}
