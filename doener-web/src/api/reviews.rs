//! Review endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use doener_common::db::reviews;
use doener_common::models::{RestaurantInput, RestaurantStats, ReviewInput};
use serde::{Deserialize, Serialize};

use super::error::{json_body, path_param};
use super::{ApiError, CurrentUser};
use crate::views::{ListingView, ReviewView};
use crate::AppState;

/// Review stored, with the restaurant's refreshed statistics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCreated {
    /// Present when the listing was found or created in the same call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<ListingView>,
    pub review: ReviewView,
    pub stats: RestaurantStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdated {
    pub review: ReviewView,
    pub stats: RestaurantStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDeleted {
    pub id: i64,
    pub restaurant_id: i64,
    pub stats: RestaurantStats,
}

/// Listing plus review in one submission
#[derive(Debug, Deserialize)]
pub struct ListingReviewInput {
    pub restaurant: RestaurantInput,
    pub review: ReviewInput,
}

/// POST /api/reviews
///
/// Finds the listing by name and location, creating it when missing, then
/// stores the review. A rejected review leaves no new listing behind.
pub async fn submit_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<ListingReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewCreated>), ApiError> {
    let input = json_body(payload)?;
    let (restaurant, review, stats) =
        reviews::submit_review(&state.db, &user.0.id, &input.restaurant, &input.review).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewCreated {
            restaurant: Some(ListingView::build(restaurant, &state.files).await),
            review: ReviewView::build(review, &state.files).await,
            stats,
        }),
    ))
}

/// PUT /api/reviews/:id
pub async fn update_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<ReviewUpdated>, ApiError> {
    let id = path_param(id)?;
    let input = json_body(payload)?;

    let existing = reviews::get_review(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Review {} not found", id)))?;
    user.ensure_may_modify(&existing.user_id, &format!("review {}", id))?;

    let (review, stats) = reviews::update_review(&state.db, id, &input).await?;

    Ok(Json(ReviewUpdated {
        review: ReviewView::build(review, &state.files).await,
        stats,
    }))
}

/// DELETE /api/reviews/:id
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ReviewDeleted>, ApiError> {
    let id = path_param(id)?;
    let existing = reviews::get_review(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Review {} not found", id)))?;
    user.ensure_may_modify(&existing.user_id, &format!("review {}", id))?;

    remove_review(&state, id).await.map(Json)
}

/// Delete a review and report the restaurant's new statistics
pub(crate) async fn remove_review(state: &AppState, id: i64) -> Result<ReviewDeleted, ApiError> {
    let (review, stats) = reviews::delete_review(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Review {} not found", id)))?;

    Ok(ReviewDeleted {
        id: review.id,
        restaurant_id: review.restaurant_id,
        stats,
    })
}

#[derive(Debug, Serialize)]
pub struct MyReview {
    pub review: ReviewView,
    pub restaurant: ListingView,
}

/// GET /api/my-reviews
///
/// The signed-in user's reviews, newest first.
pub async fn my_reviews(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<MyReview>>, ApiError> {
    let rows = reviews::list_for_user(&state.db, &user.0.id).await?;

    let mut mine = Vec::with_capacity(rows.len());
    for (review, restaurant) in rows {
        mine.push(MyReview {
            review: ReviewView::build(review, &state.files).await,
            restaurant: ListingView::build(restaurant, &state.files).await,
        });
    }

    Ok(Json(mine))
}
