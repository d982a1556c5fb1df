//! Shared map link endpoint

use axum::{
    extract::{rejection::QueryRejection, Query},
    Json,
};
use doener_common::place_link::{parse_place_link, PlaceInfo};
use serde::Deserialize;

use super::error::query_params;
use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct PlaceLinkQuery {
    pub url: String,
}

/// GET /api/place-link?url=...
///
/// 400 when the link's coordinates are out of range.
pub async fn parse_link(
    query: Result<Query<PlaceLinkQuery>, QueryRejection>,
) -> Result<Json<PlaceInfo>, ApiError> {
    let query = query_params(query)?;
    parse_place_link(&query.url)
        .map(Json)
        .ok_or_else(|| ApiError::BadRequest("Link contains invalid coordinates".to_string()))
}
