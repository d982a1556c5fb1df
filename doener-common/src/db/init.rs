//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas,
//! creates tables idempotently and then runs versioned migrations.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database at `db_path` and bring its schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets search reads proceed while a review write holds the lock
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every connection to `sqlite::memory:` is a separate database, so the
/// pool is pinned to one connection that never expires.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys (reviews cascade with their restaurant)
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_files_table(pool).await?;
    create_restaurants_table(pool).await?;
    create_reviews_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application key-value pairs such as the URL-signing secret.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            uploaded_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_restaurants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doener_restaurants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            city TEXT NOT NULL,
            country TEXT NOT NULL DEFAULT 'DE',
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            doener_image TEXT REFERENCES files(id) ON DELETE SET NULL,
            added_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            review_count INTEGER NOT NULL DEFAULT 0,
            average_rating REAL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_restaurants_city ON doener_restaurants(city)",
        "CREATE INDEX IF NOT EXISTS idx_restaurants_name ON doener_restaurants(name)",
        "CREATE INDEX IF NOT EXISTS idx_restaurants_rating ON doener_restaurants(average_rating)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doener_reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            restaurant_id INTEGER NOT NULL REFERENCES doener_restaurants(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            bread_has_sesame INTEGER NOT NULL DEFAULT 0,
            bread_fluffy_inside INTEGER NOT NULL DEFAULT 0,
            bread_crispy_outside INTEGER NOT NULL DEFAULT 0,
            meat_type TEXT,
            meat_protein TEXT,
            meat_seasoning TEXT,
            has_onions INTEGER NOT NULL DEFAULT 0,
            spice_level TEXT,
            has_yoghurt_sauce INTEGER NOT NULL DEFAULT 0,
            has_garlic_sauce INTEGER NOT NULL DEFAULT 0,
            overall_rating INTEGER,
            meat_rating INTEGER,
            bread_rating INTEGER,
            veggies_rating INTEGER,
            sauce_rating INTEGER,
            notes TEXT,
            image_file_id TEXT REFERENCES files(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, restaurant_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_reviews_restaurant ON doener_reviews(restaurant_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_reviews_user ON doener_reviews(user_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
