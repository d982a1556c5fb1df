//! Restaurant store
//!
//! Listings plus their cached `review_count` / `average_rating`. The cache
//! is only ever written by [`recompute_stats`], which rereads every rating of
//! the restaurant.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::db::files;
use crate::models::{Rating, Restaurant, RestaurantInput, RestaurantStats};
use crate::{Error, Result};

const RESTAURANT_COLUMNS: &str = "id, name, city, country, latitude, longitude, doener_image, \
     added_by, review_count, average_rating, created_at, updated_at";

/// Coordinate distance (degrees, per axis) under which two same-named
/// listings are the same place, roughly 100 m
pub const DUPLICATE_RADIUS_DEG: f64 = 0.001;

/// Candidate ordering for searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestaurantOrder {
    /// Average rating descending, then review count descending
    #[default]
    Rating,
    /// Review count descending
    ReviewCount,
}

/// Name/city substring search with optional rating floor
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery<'a> {
    pub text: &'a str,
    pub min_rating: Option<f64>,
    pub order: RestaurantOrder,
    pub limit: i64,
}

/// Escape `%`, `_` and `\` so user text matches literally inside LIKE
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Restaurants whose name or city contains `query.text` (case-insensitive)
pub async fn search_candidates(pool: &SqlitePool, query: &CandidateQuery<'_>) -> Result<Vec<Restaurant>> {
    let pattern = format!("%{}%", escape_like(&query.text.to_lowercase()));

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM doener_restaurants WHERE (LOWER(name) LIKE ",
        RESTAURANT_COLUMNS
    ));
    builder.push_bind(pattern.clone());
    builder.push(" ESCAPE '\\' OR LOWER(city) LIKE ");
    builder.push_bind(pattern);
    builder.push(" ESCAPE '\\')");

    if let Some(min_rating) = query.min_rating {
        builder.push(" AND average_rating >= ");
        builder.push_bind(min_rating);
    }

    builder.push(match query.order {
        RestaurantOrder::Rating => {
            " ORDER BY average_rating IS NULL, average_rating DESC, review_count DESC, id ASC"
        }
        RestaurantOrder::ReviewCount => " ORDER BY review_count DESC, id ASC",
    });
    builder.push(" LIMIT ");
    builder.push_bind(query.limit);

    let restaurants = builder
        .build_query_as::<Restaurant>()
        .fetch_all(pool)
        .await?;

    debug!(
        "Candidate search {:?} returned {} restaurants",
        query.text,
        restaurants.len()
    );

    Ok(restaurants)
}

pub async fn get_restaurant(pool: &SqlitePool, id: i64) -> Result<Option<Restaurant>> {
    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {} FROM doener_restaurants WHERE id = ?",
        RESTAURANT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(restaurant)
}

/// Fetch listings by id, skipping unknown ids, in id order
pub async fn get_many(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Restaurant>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM doener_restaurants WHERE id IN (",
        RESTAURANT_COLUMNS
    ));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id ASC");

    let restaurants = builder
        .build_query_as::<Restaurant>()
        .fetch_all(pool)
        .await?;

    Ok(restaurants)
}

/// Most recently created listings (admin overview)
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Restaurant>> {
    let restaurants = sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {} FROM doener_restaurants ORDER BY created_at DESC, id DESC LIMIT ?",
        RESTAURANT_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(restaurants)
}

pub(crate) async fn fetch_in(conn: &mut SqliteConnection, id: i64) -> Result<Restaurant> {
    sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {} FROM doener_restaurants WHERE id = ?",
        RESTAURANT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Restaurant {}", id)))
}

/// Same name (case-insensitive) within [`DUPLICATE_RADIUS_DEG`] on both axes
pub async fn find_duplicate(
    conn: &mut SqliteConnection,
    name: &str,
    latitude: f64,
    longitude: f64,
) -> Result<Option<Restaurant>> {
    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {} FROM doener_restaurants
         WHERE LOWER(name) = LOWER(?)
           AND ABS(latitude - ?) < ?
           AND ABS(longitude - ?) < ?
         ORDER BY id ASC
         LIMIT 1",
        RESTAURANT_COLUMNS
    ))
    .bind(name.trim())
    .bind(latitude)
    .bind(DUPLICATE_RADIUS_DEG)
    .bind(longitude)
    .bind(DUPLICATE_RADIUS_DEG)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(restaurant)
}

/// Create a listing; a same-named listing at the same spot is a conflict
pub async fn insert_restaurant(
    pool: &SqlitePool,
    added_by: &str,
    input: &RestaurantInput,
) -> Result<Restaurant> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    if let Some(existing) = find_duplicate(&mut tx, &input.name, input.latitude, input.longitude).await? {
        return Err(Error::Conflict(format!(
            "A restaurant named {:?} already exists at this location (id {})",
            existing.name, existing.id
        )));
    }

    let restaurant = insert_row(&mut tx, added_by, input).await?;
    tx.commit().await?;

    Ok(restaurant)
}

/// Return the listing at this spot, creating it when there is none
///
/// Runs on the caller's transaction; a listing created here is rolled back
/// with it.
pub async fn find_or_create_in(
    conn: &mut SqliteConnection,
    added_by: &str,
    input: &RestaurantInput,
) -> Result<Restaurant> {
    input.validate()?;

    if let Some(existing) = find_duplicate(&mut *conn, &input.name, input.latitude, input.longitude).await? {
        return Ok(existing);
    }

    insert_row(conn, added_by, input).await
}

async fn insert_row(conn: &mut SqliteConnection, added_by: &str, input: &RestaurantInput) -> Result<Restaurant> {
    if let Some(file_id) = &input.doener_image {
        files::ensure_exists(&mut *conn, file_id).await?;
    }

    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO doener_restaurants
            (name, city, country, latitude, longitude, doener_image, added_by,
             review_count, average_rating, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
        "#,
    )
    .bind(input.name.trim())
    .bind(input.city.trim())
    .bind(input.country.to_uppercase())
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.doener_image.as_deref())
    .bind(added_by)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    info!("Created restaurant {} ({:?}) for user {}", id, input.name.trim(), added_by);

    fetch_in(conn, id).await
}

/// Replace the listing fields; stats are untouched
pub async fn update_restaurant(pool: &SqlitePool, id: i64, input: &RestaurantInput) -> Result<Restaurant> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    if let Some(file_id) = &input.doener_image {
        files::ensure_exists(&mut tx, file_id).await?;
    }

    let result = sqlx::query(
        r#"
        UPDATE doener_restaurants
        SET name = ?, city = ?, country = ?, latitude = ?, longitude = ?,
            doener_image = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.name.trim())
    .bind(input.city.trim())
    .bind(input.country.to_uppercase())
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.doener_image.as_deref())
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Restaurant {}", id)));
    }

    let restaurant = fetch_in(&mut tx, id).await?;
    tx.commit().await?;

    Ok(restaurant)
}

/// Delete a listing, its reviews (cascade) and the image records they held
///
/// Returns the deleted listing, or `None` when it did not exist.
pub async fn delete_restaurant(pool: &SqlitePool, id: i64) -> Result<Option<Restaurant>> {
    let mut tx = pool.begin().await?;

    let restaurant = match fetch_in(&mut tx, id).await {
        Ok(restaurant) => restaurant,
        Err(Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut image_ids: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT image_file_id FROM doener_reviews WHERE restaurant_id = ? AND image_file_id IS NOT NULL",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;
    if let Some(file_id) = &restaurant.doener_image {
        image_ids.push(file_id.clone());
    }

    sqlx::query("DELETE FROM doener_reviews WHERE restaurant_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM doener_restaurants WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let mut removed = 0;
    for file_id in &image_ids {
        if files::delete_unreferenced(&mut tx, file_id).await? {
            removed += 1;
        }
    }

    tx.commit().await?;
    info!(
        "Deleted restaurant {} ({:?}) and {} image records",
        id, restaurant.name, removed
    );

    Ok(Some(restaurant))
}

/// Recompute and persist `review_count` / `average_rating` from stored reviews
///
/// Call on the same connection (or transaction) that changed the reviews.
pub async fn recompute_stats(conn: &mut SqliteConnection, restaurant_id: i64) -> Result<RestaurantStats> {
    let rows: Vec<(Option<i64>, Option<i64>, Option<i64>, Option<i64>, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT overall_rating, meat_rating, bread_rating, veggies_rating, sauce_rating
        FROM doener_reviews
        WHERE restaurant_id = ?
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(&mut *conn)
    .await?;

    let ratings: Vec<Option<Rating>> = rows
        .into_iter()
        .map(|(overall, meat, bread, veggies, sauce)| Rating::from_columns(overall, meat, bread, veggies, sauce))
        .collect();
    let stats = RestaurantStats::from_ratings(ratings.iter().map(Option::as_ref));

    sqlx::query(
        "UPDATE doener_restaurants SET review_count = ?, average_rating = ?, updated_at = ? WHERE id = ?",
    )
    .bind(stats.review_count)
    .bind(stats.average_rating)
    .bind(Utc::now())
    .bind(restaurant_id)
    .execute(&mut *conn)
    .await?;

    debug!(
        "Recomputed stats for restaurant {}: {} reviews, average {:?}",
        restaurant_id, stats.review_count, stats.average_rating
    );

    Ok(stats)
}

/// Recompute the cached stats of one restaurant in its own transaction
pub async fn recompute_stats_for(pool: &SqlitePool, restaurant_id: i64) -> Result<RestaurantStats> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM doener_restaurants WHERE id = ?")
        .bind(restaurant_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Restaurant {}", restaurant_id)));
    }

    let stats = recompute_stats(&mut tx, restaurant_id).await?;
    tx.commit().await?;

    Ok(stats)
}

/// Recompute the cached stats of every restaurant; returns how many were touched
pub async fn recompute_all_stats(pool: &SqlitePool) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM doener_restaurants ORDER BY id")
        .fetch_all(&mut *tx)
        .await?;

    for id in &ids {
        recompute_stats(&mut tx, *id).await?;
    }

    tx.commit().await?;

    Ok(ids.len())
}
