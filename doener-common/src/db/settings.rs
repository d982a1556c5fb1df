//! Key-value settings

use rand::RngCore;
use sqlx::SqlitePool;
use tracing::info;

use crate::Result;

/// Settings key of the secret used to sign file URLs
pub const SIGNING_SECRET_KEY: &str = "file_signing_secret";

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value.flatten())
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the URL-signing secret, generating and storing one on first use
pub async fn load_or_create_signing_secret(pool: &SqlitePool) -> Result<String> {
    if let Some(secret) = get_setting(pool, SIGNING_SECRET_KEY).await? {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

    set_setting(pool, SIGNING_SECRET_KEY, &secret).await?;
    info!("Generated new file signing secret");

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    #[tokio::test]
    async fn test_signing_secret_is_stable() {
        let pool = init_in_memory().await.unwrap();

        let first = load_or_create_signing_secret(&pool).await.unwrap();
        let second = load_or_create_signing_secret(&pool).await.unwrap();

        assert_eq!(first.len(), 64);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_set_setting_overwrites() {
        let pool = init_in_memory().await.unwrap();

        set_setting(&pool, "k", "one").await.unwrap();
        set_setting(&pool, "k", "two").await.unwrap();

        assert_eq!(get_setting(&pool, "k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(get_setting(&pool, "missing").await.unwrap(), None);
    }
}
