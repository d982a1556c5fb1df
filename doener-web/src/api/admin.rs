//! Admin moderation endpoints
//!
//! Mounted behind both the identity and the admin middleware.

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Extension, Json,
};
use doener_common::db::{restaurants, reviews};
use doener_common::models::RestaurantStats;
use serde::Serialize;
use tracing::info;

use super::error::path_param;
use super::reviews::{remove_review, ReviewDeleted};
use super::{ApiError, CurrentUser};
use crate::views::{ListingView, ReviewView};
use crate::AppState;

/// Rows shown on the admin overviews
const ADMIN_PAGE_SIZE: i64 = 100;

/// GET /api/admin/restaurants
pub async fn list_restaurants(State(state): State<AppState>) -> Result<Json<Vec<ListingView>>, ApiError> {
    let rows = restaurants::list_recent(&state.db, ADMIN_PAGE_SIZE).await?;

    let mut listings = Vec::with_capacity(rows.len());
    for restaurant in rows {
        listings.push(ListingView::build(restaurant, &state.files).await);
    }

    Ok(Json(listings))
}

#[derive(Debug, Serialize)]
pub struct RestaurantDeleted {
    pub id: i64,
    pub name: String,
}

/// DELETE /api/admin/restaurants/:id
///
/// Removes the listing, its reviews and its image record.
pub async fn delete_restaurant(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<RestaurantDeleted>, ApiError> {
    let id = path_param(id)?;
    let restaurant = restaurants::delete_restaurant(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Restaurant {} not found", id)))?;
    info!("Admin {} deleted restaurant {}", admin.0.id, id);

    Ok(Json(RestaurantDeleted {
        id: restaurant.id,
        name: restaurant.name,
    }))
}

/// GET /api/admin/reviews
pub async fn list_reviews(State(state): State<AppState>) -> Result<Json<Vec<ReviewView>>, ApiError> {
    let rows = reviews::list_recent(&state.db, ADMIN_PAGE_SIZE).await?;

    let mut views = Vec::with_capacity(rows.len());
    for authored in rows {
        views.push(ReviewView::with_author(authored, &state.files).await);
    }

    Ok(Json(views))
}

/// DELETE /api/admin/reviews/:id
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ReviewDeleted>, ApiError> {
    let id = path_param(id)?;
    let deleted = remove_review(&state, id).await?;
    info!("Admin {} deleted review {}", admin.0.id, id);

    Ok(Json(deleted))
}

/// POST /api/admin/restaurants/:id/recompute
pub async fn recompute_restaurant(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<RestaurantStats>, ApiError> {
    let id = path_param(id)?;
    let stats = restaurants::recompute_stats_for(&state.db, id).await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct RecomputeSummary {
    pub recomputed: usize,
}

/// POST /api/admin/recompute
pub async fn recompute_all(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
) -> Result<Json<RecomputeSummary>, ApiError> {
    let recomputed = restaurants::recompute_all_stats(&state.db).await?;
    info!("Admin {} recomputed statistics of {} restaurants", admin.0.id, recomputed);

    Ok(Json(RecomputeSummary { recomputed }))
}
