//! Search endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::search::{search_restaurants, AttributeFilters, RestaurantResult, SearchRequest, SortBy};
use crate::AppState;

/// Lenient number: unparsable input counts as no threshold
fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.trim().parse::<f64>().ok()).filter(|v| v.is_finite()))
}

/// Query parameters besides the attribute flags
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub sort_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub restaurants: Vec<RestaurantResult>,
}

/// GET /api/search?location=&minRating=&sortBy=rating|reviews&<flag>=true
///
/// Always 200: malformed query strings, short queries and store failures
/// give an empty list.
pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
    filters: Result<Query<AttributeFilters>, QueryRejection>,
) -> Json<SearchResponse> {
    let (Query(params), Query(filters)) = match (params, filters) {
        (Ok(params), Ok(filters)) => (params, filters),
        (Err(rejection), _) | (_, Err(rejection)) => {
            debug!("Ignoring malformed search query: {}", rejection.body_text());
            return Json(SearchResponse { restaurants: Vec::new() });
        }
    };

    let request = SearchRequest {
        location: params.location,
        min_rating: params.min_rating,
        sort_by: params.sort_by.as_deref().map(SortBy::from_param).unwrap_or_default(),
        filters,
    };

    let restaurants = search_restaurants(&state.db, &state.files, &request).await;
    Json(SearchResponse { restaurants })
}
