//! User accounts
//!
//! Accounts are provisioned by the identity provider in front of the
//! service; this store only mirrors id, email, display name and role.

use sqlx::SqlitePool;
use tracing::info;

use crate::models::User;
use crate::{Error, Result};

/// Insert or refresh a user record
pub async fn upsert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    if user.id.trim().is_empty() {
        return Err(Error::InvalidInput("User id is required".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, is_admin)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            name = excluded.name,
            is_admin = excluded.is_admin
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.is_admin)
    .execute(pool)
    .await?;

    info!("Upserted user {} (admin: {})", user.id, user.is_admin);
    Ok(())
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT id, email, name, is_admin FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}
