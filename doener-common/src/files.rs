//! File URL resolution
//!
//! Image references on reviews and listings are file ids. Displaying one
//! needs a URL into external object storage, signed so it expires.
//!
//! Signed URL format:
//!
//! ```text
//! {base_url}/{key}?expires={unix_seconds}&signature={sha256("{key}:{expires}:{secret}")}
//! ```
//!
//! Without a configured `base_url` the stable fallback `/api/files/{key}` is
//! returned instead.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::files::get_file;

/// Path prefix of the unsigned fallback URL
pub const FALLBACK_PREFIX: &str = "/api/files";

/// Signature over key, expiry and secret as 64 hex characters
pub fn sign(key: &str, expires: i64, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", key, expires, secret).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolves file ids to displayable URLs
#[derive(Clone)]
pub struct FileUrlResolver {
    pool: SqlitePool,
    base_url: Option<String>,
    secret: String,
    ttl_secs: u64,
}

impl FileUrlResolver {
    pub fn new(pool: SqlitePool, base_url: Option<String>, secret: String, ttl_secs: u64) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Self {
            pool,
            base_url,
            secret,
            ttl_secs,
        }
    }

    /// URL for a storage key, valid from `now` (unix seconds)
    pub fn url_for_key(&self, key: &str, now: i64) -> String {
        match &self.base_url {
            Some(base_url) => {
                let expires = now.saturating_add(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX));
                format!(
                    "{}/{}?expires={}&signature={}",
                    base_url,
                    key,
                    expires,
                    sign(key, expires, &self.secret)
                )
            }
            None => format!("{}/{}", FALLBACK_PREFIX, key),
        }
    }

    /// Resolve an optional file id; never fails
    ///
    /// Unknown ids and store errors yield `None`, the latter logged.
    pub async fn resolve(&self, file_id: Option<&str>) -> Option<String> {
        let file_id = file_id?;

        match get_file(&self.pool, file_id).await {
            Ok(Some(file)) => Some(self.url_for_key(&file.key, Utc::now().timestamp())),
            Ok(None) => {
                warn!("File {} not found, no URL", file_id);
                None
            }
            Err(e) => {
                warn!("Failed to resolve file {}: {}", file_id, e);
                None
            }
        }
    }
}
