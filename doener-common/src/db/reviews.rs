//! Review store
//!
//! Every write runs in a transaction that also recomputes the owning
//! restaurant's cached statistics, so `review_count` and `average_rating`
//! never disagree with the stored reviews.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::db::files;
use crate::db::restaurants::{self, recompute_stats};
use crate::models::{
    MeatProtein, MeatSeasoning, MeatType, Rating, Restaurant, RestaurantStats, Review, ReviewInput,
    RestaurantInput, SpiceLevel,
};
use crate::{Error, Result};

const REVIEW_COLUMNS: &str = "r.id, r.restaurant_id, r.user_id, r.bread_has_sesame, \
     r.bread_fluffy_inside, r.bread_crispy_outside, r.meat_type, r.meat_protein, r.meat_seasoning, \
     r.has_onions, r.spice_level, r.has_yoghurt_sauce, r.has_garlic_sauce, r.overall_rating, \
     r.meat_rating, r.bread_rating, r.veggies_rating, r.sauce_rating, r.notes, r.image_file_id, \
     r.created_at, r.updated_at";

/// Raw review row; categorical columns are parsed in [`ReviewRow::into_review`]
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    restaurant_id: i64,
    user_id: String,
    bread_has_sesame: bool,
    bread_fluffy_inside: bool,
    bread_crispy_outside: bool,
    meat_type: Option<String>,
    meat_protein: Option<String>,
    meat_seasoning: Option<String>,
    has_onions: bool,
    spice_level: Option<String>,
    has_yoghurt_sauce: bool,
    has_garlic_sauce: bool,
    overall_rating: Option<i64>,
    meat_rating: Option<i64>,
    bread_rating: Option<i64>,
    veggies_rating: Option<i64>,
    sauce_rating: Option<i64>,
    notes: Option<String>,
    image_file_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(default)]
    author_name: Option<String>,
}

/// Parse a stored categorical value; unknown spellings become absent
fn parse_attribute<T>(
    review_id: i64,
    column: &str,
    value: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = value?;
    let parsed = parse(raw);
    if parsed.is_none() {
        warn!(
            "Review {}: ignoring unrecognized {} value {:?}",
            review_id, column, raw
        );
    }
    parsed
}

impl ReviewRow {
    fn into_review(self) -> (Review, Option<String>) {
        let id = self.id;
        let rating = Rating::from_columns(
            self.overall_rating,
            self.meat_rating,
            self.bread_rating,
            self.veggies_rating,
            self.sauce_rating,
        );

        let review = Review {
            id,
            restaurant_id: self.restaurant_id,
            user_id: self.user_id,
            bread_has_sesame: self.bread_has_sesame,
            bread_fluffy_inside: self.bread_fluffy_inside,
            bread_crispy_outside: self.bread_crispy_outside,
            meat_type: parse_attribute(id, "meat_type", self.meat_type.as_deref(), MeatType::from_db_str),
            meat_protein: parse_attribute(
                id,
                "meat_protein",
                self.meat_protein.as_deref(),
                MeatProtein::from_db_str,
            ),
            meat_seasoning: parse_attribute(
                id,
                "meat_seasoning",
                self.meat_seasoning.as_deref(),
                MeatSeasoning::from_db_str,
            ),
            has_onions: self.has_onions,
            spice_level: parse_attribute(
                id,
                "spice_level",
                self.spice_level.as_deref(),
                SpiceLevel::from_db_str,
            ),
            has_yoghurt_sauce: self.has_yoghurt_sauce,
            has_garlic_sauce: self.has_garlic_sauce,
            rating,
            notes: self.notes,
            image_file_id: self.image_file_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        (review, self.author_name)
    }
}

/// Review together with the display name of its author
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoredReview {
    pub review: Review,
    pub author_name: Option<String>,
}

/// Split a rating into the five nullable rating columns
fn rating_columns(rating: &Rating) -> [Option<i64>; 5] {
    match rating {
        Rating::Stars(stars) => [Some(i64::from(*stars)), None, None, None, None],
        Rating::Categories(c) => [
            None,
            Some(i64::from(c.meat)),
            Some(i64::from(c.bread)),
            Some(i64::from(c.veggies)),
            Some(i64::from(c.sauce)),
        ],
    }
}

/// Reviews of one restaurant, newest first
pub async fn list_for_restaurant(pool: &SqlitePool, restaurant_id: i64) -> Result<Vec<Review>> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {} FROM doener_reviews r WHERE r.restaurant_id = ? ORDER BY r.created_at DESC, r.id DESC",
        REVIEW_COLUMNS
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.into_review().0).collect())
}

/// Reviews of one restaurant with author names, newest first
pub async fn list_for_restaurant_with_authors(
    pool: &SqlitePool,
    restaurant_id: i64,
) -> Result<Vec<AuthoredReview>> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {}, u.name AS author_name
         FROM doener_reviews r
         LEFT JOIN users u ON u.id = r.user_id
         WHERE r.restaurant_id = ?
         ORDER BY r.created_at DESC, r.id DESC",
        REVIEW_COLUMNS
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let (review, author_name) = row.into_review();
            AuthoredReview { review, author_name }
        })
        .collect())
}

/// Most recent reviews across all restaurants (admin overview)
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<AuthoredReview>> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {}, u.name AS author_name
         FROM doener_reviews r
         LEFT JOIN users u ON u.id = r.user_id
         ORDER BY r.created_at DESC, r.id DESC
         LIMIT ?",
        REVIEW_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let (review, author_name) = row.into_review();
            AuthoredReview { review, author_name }
        })
        .collect())
}

pub async fn get_review(pool: &SqlitePool, id: i64) -> Result<Option<Review>> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {} FROM doener_reviews r WHERE r.id = ?",
        REVIEW_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.into_review().0))
}

/// The review a user left for a restaurant, if any
pub async fn find_by_user(pool: &SqlitePool, user_id: &str, restaurant_id: i64) -> Result<Option<Review>> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {} FROM doener_reviews r WHERE r.user_id = ? AND r.restaurant_id = ?",
        REVIEW_COLUMNS
    ))
    .bind(user_id)
    .bind(restaurant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.into_review().0))
}

/// All reviews written by a user with their restaurants, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<(Review, Restaurant)>> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {} FROM doener_reviews r WHERE r.user_id = ? ORDER BY r.created_at DESC, r.id DESC",
        REVIEW_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut reviews = Vec::with_capacity(rows.len());
    for row in rows {
        let (review, _) = row.into_review();
        match crate::db::restaurants::get_restaurant(pool, review.restaurant_id).await? {
            Some(restaurant) => reviews.push((review, restaurant)),
            None => warn!(
                "Review {} references missing restaurant {}",
                review.id, review.restaurant_id
            ),
        }
    }

    Ok(reviews)
}

async fn fetch_in(conn: &mut SqliteConnection, id: i64) -> Result<Review> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {} FROM doener_reviews r WHERE r.id = ?",
        REVIEW_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| row.into_review().0)
        .ok_or_else(|| Error::NotFound(format!("Review {}", id)))
}

/// Store a user's review of a restaurant and refresh the restaurant stats
///
/// One review per user and restaurant; a second one is a conflict.
pub async fn insert_review(
    pool: &SqlitePool,
    user_id: &str,
    restaurant_id: i64,
    input: &ReviewInput,
) -> Result<(Review, RestaurantStats)> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    let inserted = insert_in(&mut tx, user_id, restaurant_id, input).await?;
    tx.commit().await?;

    Ok(inserted)
}

/// Find or create the listing and review it, all in one transaction
///
/// Nothing is stored when the review is rejected. Returns the listing with
/// its refreshed stats.
pub async fn submit_review(
    pool: &SqlitePool,
    user_id: &str,
    listing: &RestaurantInput,
    input: &ReviewInput,
) -> Result<(Restaurant, Review, RestaurantStats)> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    let restaurant = restaurants::find_or_create_in(&mut tx, user_id, listing).await?;
    let (review, stats) = insert_in(&mut tx, user_id, restaurant.id, input).await?;
    let restaurant = restaurants::fetch_in(&mut tx, restaurant.id).await?;
    tx.commit().await?;

    Ok((restaurant, review, stats))
}

async fn insert_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    restaurant_id: i64,
    input: &ReviewInput,
) -> Result<(Review, RestaurantStats)> {
    let restaurant: Option<i64> = sqlx::query_scalar("SELECT id FROM doener_restaurants WHERE id = ?")
        .bind(restaurant_id)
        .fetch_optional(&mut *conn)
        .await?;
    if restaurant.is_none() {
        return Err(Error::NotFound(format!("Restaurant {}", restaurant_id)));
    }

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM doener_reviews WHERE user_id = ? AND restaurant_id = ?")
            .bind(user_id)
            .bind(restaurant_id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(existing) = existing {
        return Err(Error::Conflict(format!(
            "You already reviewed this restaurant (review {})",
            existing
        )));
    }

    if let Some(file_id) = &input.image_file_id {
        files::ensure_exists(&mut *conn, file_id).await?;
    }

    let attributes = &input.attributes;
    let [overall, meat, bread, veggies, sauce] = rating_columns(&input.rating);
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO doener_reviews
            (restaurant_id, user_id, bread_has_sesame, bread_fluffy_inside, bread_crispy_outside,
             meat_type, meat_protein, meat_seasoning, has_onions, spice_level,
             has_yoghurt_sauce, has_garlic_sauce,
             overall_rating, meat_rating, bread_rating, veggies_rating, sauce_rating,
             notes, image_file_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(restaurant_id)
    .bind(user_id)
    .bind(attributes.bread_has_sesame)
    .bind(attributes.bread_fluffy_inside)
    .bind(attributes.bread_crispy_outside)
    .bind(attributes.meat_type.as_db_str())
    .bind(attributes.meat_protein.as_db_str())
    .bind(attributes.meat_seasoning.as_db_str())
    .bind(attributes.has_onions)
    .bind(attributes.spice_level.as_db_str())
    .bind(attributes.has_yoghurt_sauce)
    .bind(attributes.has_garlic_sauce)
    .bind(overall)
    .bind(meat)
    .bind(bread)
    .bind(veggies)
    .bind(sauce)
    .bind(input.normalized_notes())
    .bind(input.image_file_id.as_deref())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let review_id = result.last_insert_rowid();
    let stats = recompute_stats(&mut *conn, restaurant_id).await?;
    let review = fetch_in(conn, review_id).await?;

    info!(
        "User {} reviewed restaurant {} (review {}, score {:.2})",
        user_id,
        restaurant_id,
        review_id,
        input.rating.score()
    );

    Ok((review, stats))
}

/// Replace the body of an existing review and refresh the restaurant stats
pub async fn update_review(pool: &SqlitePool, id: i64, input: &ReviewInput) -> Result<(Review, RestaurantStats)> {
    input.validate()?;

    let mut tx = pool.begin().await?;

    let restaurant_id: Option<i64> = sqlx::query_scalar("SELECT restaurant_id FROM doener_reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(restaurant_id) = restaurant_id else {
        return Err(Error::NotFound(format!("Review {}", id)));
    };

    if let Some(file_id) = &input.image_file_id {
        files::ensure_exists(&mut tx, file_id).await?;
    }

    let attributes = &input.attributes;
    let [overall, meat, bread, veggies, sauce] = rating_columns(&input.rating);

    sqlx::query(
        r#"
        UPDATE doener_reviews
        SET bread_has_sesame = ?, bread_fluffy_inside = ?, bread_crispy_outside = ?,
            meat_type = ?, meat_protein = ?, meat_seasoning = ?,
            has_onions = ?, spice_level = ?,
            has_yoghurt_sauce = ?, has_garlic_sauce = ?,
            overall_rating = ?, meat_rating = ?, bread_rating = ?, veggies_rating = ?, sauce_rating = ?,
            notes = ?, image_file_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(attributes.bread_has_sesame)
    .bind(attributes.bread_fluffy_inside)
    .bind(attributes.bread_crispy_outside)
    .bind(attributes.meat_type.as_db_str())
    .bind(attributes.meat_protein.as_db_str())
    .bind(attributes.meat_seasoning.as_db_str())
    .bind(attributes.has_onions)
    .bind(attributes.spice_level.as_db_str())
    .bind(attributes.has_yoghurt_sauce)
    .bind(attributes.has_garlic_sauce)
    .bind(overall)
    .bind(meat)
    .bind(bread)
    .bind(veggies)
    .bind(sauce)
    .bind(input.normalized_notes())
    .bind(input.image_file_id.as_deref())
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let stats = recompute_stats(&mut tx, restaurant_id).await?;
    let review = fetch_in(&mut tx, id).await?;

    tx.commit().await?;
    info!("Updated review {} of restaurant {}", id, restaurant_id);

    Ok((review, stats))
}

/// Delete a review and refresh the restaurant stats
///
/// Returns the deleted review and the new stats, or `None` when no such review existed.
pub async fn delete_review(pool: &SqlitePool, id: i64) -> Result<Option<(Review, RestaurantStats)>> {
    let mut tx = pool.begin().await?;

    let review = match fetch_in(&mut tx, id).await {
        Ok(review) => review,
        Err(Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    sqlx::query("DELETE FROM doener_reviews WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let stats = recompute_stats(&mut tx, review.restaurant_id).await?;
    if let Some(file_id) = &review.image_file_id {
        files::delete_unreferenced(&mut tx, file_id).await?;
    }

    tx.commit().await?;
    info!("Deleted review {} of restaurant {}", id, review.restaurant_id);

    Ok(Some((review, stats)))
}
