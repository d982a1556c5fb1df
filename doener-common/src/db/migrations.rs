//! Database schema migrations
//!
//! Versioned migrations tracked in `schema_version`. Each migration is
//! idempotent so a partially applied upgrade can simply be rerun.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use ALTER TABLE** - prefer adding columns over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> = sqlx::query_scalar(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1"
    )
    .fetch_optional(pool)
    .await?;

    Ok(version.unwrap_or(0))
}

/// Set schema version in database
async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?"
    )
    .bind(table)
    .bind(column)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    declaration: &str,
) -> Result<bool> {
    if has_column(pool, table, column).await? {
        return Ok(false);
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, declaration);
    sqlx::query(&sql).execute(pool).await?;
    info!("Added column {}.{}", table, column);

    Ok(true)
}

/// Migration v1: bring review rows to the onions-flag + spice-level revision
///
/// Older databases stored a nullable `onion_level` ('mild' | 'spicy', NULL
/// meaning no onions). That maps onto `has_onions` and `spice_level`. The
/// old column is left in place and no longer read.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    for (column, declaration) in [
        ("has_onions", "INTEGER NOT NULL DEFAULT 0"),
        ("spice_level", "TEXT"),
        ("overall_rating", "INTEGER"),
        ("meat_rating", "INTEGER"),
        ("bread_rating", "INTEGER"),
        ("veggies_rating", "INTEGER"),
        ("sauce_rating", "INTEGER"),
        ("notes", "TEXT"),
        ("image_file_id", "TEXT"),
    ] {
        add_column_if_missing(pool, "doener_reviews", column, declaration).await?;
    }

    if has_column(pool, "doener_reviews", "onion_level").await? {
        let result = sqlx::query(
            r#"
            UPDATE doener_reviews
            SET has_onions = 1,
                spice_level = COALESCE(spice_level, LOWER(onion_level))
            WHERE onion_level IS NOT NULL
            "#,
        )
        .execute(pool)
        .await?;
        info!(
            "Migration v1: backfilled onions/spice level for {} legacy reviews",
            result.rows_affected()
        );
    }

    Ok(())
}

/// Migration v2: single `average_rating` cache column, recomputed from reviews
///
/// Older databases kept per-category averages on the restaurant; those are
/// superseded by one average over the review scores.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    add_column_if_missing(pool, "doener_restaurants", "average_rating", "REAL").await?;
    add_column_if_missing(pool, "doener_restaurants", "doener_image", "TEXT").await?;

    let recomputed = crate::db::restaurants::recompute_all_stats(pool).await?;
    if recomputed > 0 {
        info!("Migration v2: recomputed statistics for {} restaurants", recomputed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Database shaped like the revision that still had `onion_level`
    async fn setup_legacy_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        for statement in [
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            "CREATE TABLE doener_restaurants (id INTEGER PRIMARY KEY, name TEXT NOT NULL, review_count INTEGER NOT NULL DEFAULT 0, updated_at TIMESTAMP)",
            "CREATE TABLE doener_reviews (id INTEGER PRIMARY KEY, restaurant_id INTEGER NOT NULL, overall_rating INTEGER, onion_level TEXT, created_at TIMESTAMP)",
            "INSERT INTO doener_restaurants (id, name, review_count) VALUES (1, 'Legacy', 0)",
            "INSERT INTO doener_reviews (id, restaurant_id, overall_rating, onion_level) VALUES (1, 1, 4, 'Spicy')",
            "INSERT INTO doener_reviews (id, restaurant_id, overall_rating, onion_level) VALUES (2, 1, 2, NULL)",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }

        pool
    }

    #[tokio::test]
    async fn test_legacy_onion_level_backfill() {
        let pool = setup_legacy_db().await;

        run_migrations(&pool).await.unwrap();

        let rows: Vec<(i64, bool, Option<String>)> = sqlx::query_as(
            "SELECT id, has_onions, spice_level FROM doener_reviews ORDER BY id",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(rows[0], (1, true, Some("spicy".to_string())));
        assert_eq!(rows[1], (2, false, None));
    }

    #[tokio::test]
    async fn test_legacy_stats_recomputed() {
        let pool = setup_legacy_db().await;

        run_migrations(&pool).await.unwrap();

        let (count, average): (i64, Option<f64>) = sqlx::query_as(
            "SELECT review_count, average_rating FROM doener_restaurants WHERE id = 1",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(average, Some(3.0));
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = setup_legacy_db().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }
}
