//! Favorites lookup
//!
//! Favorites are kept client-side as a list of restaurant ids; this endpoint
//! turns them into full result records.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use doener_common::db::restaurants;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::query_params;
use super::ApiError;
use crate::aggregate::aggregate_restaurant;
use crate::search::{RestaurantResult, MAX_RESULTS};
use crate::views::ListingView;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FavoritesQuery {
    #[serde(default)]
    pub ids: String,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub restaurants: Vec<RestaurantResult>,
}

/// Parse `1,2,3`; blanks and non-numbers are skipped, duplicates dropped
pub fn parse_ids(ids: &str) -> Vec<i64> {
    let mut parsed = Vec::new();
    for id in ids.split(',').filter_map(|s| s.trim().parse::<i64>().ok()) {
        if !parsed.contains(&id) {
            parsed.push(id);
        }
    }
    parsed
}

/// GET /api/favorites?ids=1,2,3
///
/// Unknown ids are skipped; results keep the requested order.
pub async fn get_favorites(
    State(state): State<AppState>,
    query: Result<Query<FavoritesQuery>, QueryRejection>,
) -> Result<Json<FavoritesResponse>, ApiError> {
    let query = query_params(query)?;
    let mut ids = parse_ids(&query.ids);
    ids.truncate(MAX_RESULTS as usize);
    if ids.is_empty() {
        return Ok(Json(FavoritesResponse { restaurants: Vec::new() }));
    }

    let mut found = restaurants::get_many(&state.db, &ids).await?;
    found.sort_by_key(|r| ids.iter().position(|id| *id == r.id));
    debug!("Favorites: {} of {} ids found", found.len(), ids.len());

    let mut results = Vec::with_capacity(found.len());
    for restaurant in found {
        let criteria = aggregate_restaurant(&state.db, &state.files, restaurant.id).await?;
        let listing = ListingView::build(restaurant, &state.files).await;
        results.push(RestaurantResult { listing, criteria });
    }

    Ok(Json(FavoritesResponse { restaurants: results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("1,2,3"), vec![1, 2, 3]);
        assert_eq!(parse_ids(" 3 ,,x,1,3"), vec![3, 1]);
        assert!(parse_ids("").is_empty());
    }
}
