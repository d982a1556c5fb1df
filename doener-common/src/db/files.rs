//! Uploaded file records
//!
//! Only metadata lives here. The bytes sit in external object storage under
//! `key` and are served through signed URLs (see [`crate::files`]).

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::models::FileRecord;
use crate::{Error, Result};

pub async fn insert_file(pool: &SqlitePool, file: &FileRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO files (id, key, file_name, content_type, size_bytes, uploaded_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&file.id)
    .bind(&file.key)
    .bind(&file.file_name)
    .bind(&file.content_type)
    .bind(file.size_bytes)
    .bind(&file.uploaded_by)
    .execute(pool)
    .await?;

    debug!("Recorded file {} ({})", file.id, file.key);
    Ok(())
}

pub async fn get_file(pool: &SqlitePool, id: &str) -> Result<Option<FileRecord>> {
    let file = sqlx::query_as::<_, FileRecord>(
        "SELECT id, key, file_name, content_type, size_bytes, uploaded_by FROM files WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(file)
}

/// Reject references to files that were never recorded
///
/// Run on the transaction that stores the reference.
pub async fn ensure_exists(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM files WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(Error::InvalidInput(format!("Unknown file {:?}", id))),
    }
}

/// Remove a file record that no listing or review refers to any more
///
/// Returns whether a row was deleted.
pub async fn delete_unreferenced(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM files
        WHERE id = ?
          AND NOT EXISTS (SELECT 1 FROM doener_restaurants WHERE doener_image = ?)
          AND NOT EXISTS (SELECT 1 FROM doener_reviews WHERE image_file_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
