//! Restaurant listing endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use doener_common::db::{restaurants, reviews};
use doener_common::models::{RestaurantInput, ReviewInput};
use serde::Serialize;
use tracing::info;

use super::error::{json_body, path_param};
use super::reviews::ReviewCreated;
use super::{ApiError, CurrentUser};
use crate::aggregate::{aggregate, AggregatedView};
use crate::views::{ListingView, ReviewView};
use crate::AppState;

/// Listing page payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantDetail {
    pub restaurant: ListingView,
    pub reviews: Vec<ReviewView>,
    /// Aggregated criteria, including the latest review image
    pub criteria: AggregatedView,
}

/// GET /api/restaurants/:id
pub async fn get_restaurant(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<RestaurantDetail>, ApiError> {
    let id = path_param(id)?;
    let restaurant = restaurants::get_restaurant(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Restaurant {} not found", id)))?;

    let authored = reviews::list_for_restaurant_with_authors(&state.db, id).await?;
    let plain: Vec<_> = authored.iter().map(|a| a.review.clone()).collect();
    let criteria = aggregate(&plain, &state.files).await;

    let mut review_views = Vec::with_capacity(authored.len());
    for review in authored {
        review_views.push(ReviewView::with_author(review, &state.files).await);
    }

    Ok(Json(RestaurantDetail {
        restaurant: ListingView::build(restaurant, &state.files).await,
        reviews: review_views,
        criteria,
    }))
}

/// POST /api/restaurants
///
/// 409 when a same-named listing exists at the same spot.
pub async fn create_restaurant(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<RestaurantInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingView>), ApiError> {
    let input = json_body(payload)?;
    let restaurant = restaurants::insert_restaurant(&state.db, &user.0.id, &input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ListingView::build(restaurant, &state.files).await),
    ))
}

/// PUT /api/restaurants/:id
///
/// The user who added the listing, or an admin.
pub async fn update_restaurant(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RestaurantInput>, JsonRejection>,
) -> Result<Json<ListingView>, ApiError> {
    let id = path_param(id)?;
    let input = json_body(payload)?;

    let existing = restaurants::get_restaurant(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Restaurant {} not found", id)))?;
    user.ensure_may_modify(&existing.added_by, &format!("restaurant {}", id))?;

    let restaurant = restaurants::update_restaurant(&state.db, id, &input).await?;
    info!("User {} edited restaurant {}", user.0.id, id);

    Ok(Json(ListingView::build(restaurant, &state.files).await))
}

/// POST /api/restaurants/:id/reviews
///
/// 409 when the user already reviewed this restaurant.
pub async fn create_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewCreated>), ApiError> {
    let id = path_param(id)?;
    let input = json_body(payload)?;
    let (review, stats) = reviews::insert_review(&state.db, &user.0.id, id, &input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewCreated {
            restaurant: None,
            review: ReviewView::build(review, &state.files).await,
            stats,
        }),
    ))
}
