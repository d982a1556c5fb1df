//! Search and filter engine
//!
//! Text match on name or city selects candidates in SQL. Each candidate is
//! then aggregated and checked against the attribute filters: OR within a
//! group, AND across groups.

use std::cmp::Ordering;

use doener_common::db::restaurants::{self, CandidateQuery, RestaurantOrder};
use doener_common::models::{MeatProtein, MeatSeasoning, MeatType, SpiceLevel};
use doener_common::FileUrlResolver;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::aggregate::{aggregate_restaurant, AggregatedView};
use crate::views::ListingView;

/// Queries shorter than this (in characters) return nothing
pub const MIN_QUERY_LEN: usize = 2;

/// Upper bound on candidates fetched and results returned
pub const MAX_RESULTS: i64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Aggregated average rating, descending
    #[default]
    Rating,
    /// Review count, descending
    Reviews,
}

impl SortBy {
    /// Parse a `sortBy` parameter; anything unrecognized sorts by rating
    pub fn from_param(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "reviews" => SortBy::Reviews,
            _ => SortBy::Rating,
        }
    }
}

/// Checkbox-style flag: `true`, `on` and `1` are set, anything else is not
fn checked<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(matches!(value.trim().to_lowercase().as_str(), "true" | "on" | "1"))
}

/// Independently togglable attribute filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFilters {
    #[serde(default, deserialize_with = "checked")]
    pub bread_sesame: bool,
    #[serde(default, deserialize_with = "checked")]
    pub bread_fluffy: bool,
    #[serde(default, deserialize_with = "checked")]
    pub bread_crispy: bool,
    #[serde(default, deserialize_with = "checked")]
    pub meat_minced: bool,
    #[serde(default, deserialize_with = "checked")]
    pub meat_layered: bool,
    #[serde(default, deserialize_with = "checked")]
    pub meat_chicken: bool,
    #[serde(default, deserialize_with = "checked")]
    pub meat_beef: bool,
    #[serde(default, deserialize_with = "checked")]
    pub meat_mixed: bool,
    #[serde(default, deserialize_with = "checked")]
    pub seasoning_pure: bool,
    #[serde(default, deserialize_with = "checked")]
    pub seasoning_seasoned: bool,
    #[serde(default, deserialize_with = "checked")]
    pub seasoning_phosphate: bool,
    #[serde(default, deserialize_with = "checked")]
    pub mild: bool,
    #[serde(default, deserialize_with = "checked")]
    pub spicy: bool,
    #[serde(default, deserialize_with = "checked")]
    pub has_onions: bool,
    #[serde(default, deserialize_with = "checked")]
    pub yoghurt_sauce: bool,
    #[serde(default, deserialize_with = "checked")]
    pub garlic_sauce: bool,
}

/// A group passes when none of its filters is checked or any checked one holds
fn any_of(group: &[(bool, bool)]) -> bool {
    !group.iter().any(|(checked, _)| *checked) || group.iter().any(|(checked, holds)| *checked && *holds)
}

impl AttributeFilters {
    pub fn is_empty(&self) -> bool {
        *self == AttributeFilters::default()
    }

    /// Whether an aggregated restaurant passes every filter group
    pub fn matches(&self, view: &AggregatedView) -> bool {
        let bread = any_of(&[
            (self.bread_sesame, view.most_common_bread_sesame),
            (self.bread_fluffy, view.most_common_bread_fluffy),
            (self.bread_crispy, view.most_common_bread_crispy),
        ]);

        let meat_type = view.most_common_meat_type;
        let meat_types = any_of(&[
            (self.meat_minced, meat_type == Some(MeatType::Minced)),
            (self.meat_layered, meat_type == Some(MeatType::Layered)),
        ]);

        let protein = view.most_common_meat_protein;
        let proteins = any_of(&[
            (self.meat_chicken, protein == Some(MeatProtein::Chicken)),
            (self.meat_beef, protein == Some(MeatProtein::Beef)),
            (self.meat_mixed, protein == Some(MeatProtein::Mixed)),
        ]);

        let seasoning = view.most_common_meat_seasoning;
        let seasonings = any_of(&[
            (self.seasoning_pure, seasoning == Some(MeatSeasoning::Pure)),
            (self.seasoning_seasoned, seasoning == Some(MeatSeasoning::Seasoned)),
            (self.seasoning_phosphate, seasoning == Some(MeatSeasoning::Phosphate)),
        ]);

        let spice = view.most_common_spice_level;
        let spice_levels = any_of(&[
            (self.mild, spice == Some(SpiceLevel::Mild)),
            (self.spicy, spice == Some(SpiceLevel::Spicy)),
        ]);

        // Must-have flags
        let onions = !self.has_onions || view.most_common_has_onions;
        let yoghurt = !self.yoghurt_sauce || view.most_common_yoghurt_sauce;
        let garlic = !self.garlic_sauce || view.most_common_garlic_sauce;

        bread && meat_types && proteins && seasonings && spice_levels && onions && yoghurt && garlic
    }
}

/// Search input after parameter parsing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub location: String,
    pub min_rating: Option<f64>,
    pub sort_by: SortBy,
    pub filters: AttributeFilters,
}

/// One search hit: the listing plus its aggregated criteria
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantResult {
    #[serde(flatten)]
    pub listing: ListingView,
    #[serde(flatten)]
    pub criteria: AggregatedView,
}

/// Rating order: aggregated average descending, then review count descending
fn by_rating(a: &RestaurantResult, b: &RestaurantResult) -> Ordering {
    b.criteria
        .average_rating
        .partial_cmp(&a.criteria.average_rating)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.listing.review_count.cmp(&a.listing.review_count))
}

/// Run a search; never fails
///
/// Short queries return nothing without touching the store. Store errors
/// are logged and yield an empty result.
pub async fn search_restaurants(
    pool: &SqlitePool,
    files: &FileUrlResolver,
    request: &SearchRequest,
) -> Vec<RestaurantResult> {
    let location = request.location.trim();
    if location.chars().count() < MIN_QUERY_LEN {
        debug!("Search query {:?} too short", location);
        return Vec::new();
    }

    match run_search(pool, files, location, request).await {
        Ok(results) => results,
        Err(e) => {
            error!("Search for {:?} failed: {}", location, e);
            Vec::new()
        }
    }
}

async fn run_search(
    pool: &SqlitePool,
    files: &FileUrlResolver,
    location: &str,
    request: &SearchRequest,
) -> doener_common::Result<Vec<RestaurantResult>> {
    let query = CandidateQuery {
        text: location,
        min_rating: request.min_rating.filter(|rating| *rating > 0.0),
        order: match request.sort_by {
            SortBy::Rating => RestaurantOrder::Rating,
            SortBy::Reviews => RestaurantOrder::ReviewCount,
        },
        limit: MAX_RESULTS,
    };
    let candidates = restaurants::search_candidates(pool, &query).await?;
    let candidate_count = candidates.len();
    let filtered = !request.filters.is_empty();

    let mut results = Vec::with_capacity(candidate_count);
    for restaurant in candidates {
        let criteria = aggregate_restaurant(pool, files, restaurant.id).await?;
        if filtered && !request.filters.matches(&criteria) {
            continue;
        }

        let listing = ListingView::build(restaurant, files).await;
        results.push(RestaurantResult { listing, criteria });
    }

    if request.sort_by == SortBy::Rating {
        results.sort_by(by_rating);
    }
    results.truncate(MAX_RESULTS as usize);

    debug!(
        "Search {:?}: {} candidates, {} after filters (filters set: {})",
        location,
        candidate_count,
        results.len(),
        filtered
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> AggregatedView {
        AggregatedView {
            most_common_bread_sesame: true,
            most_common_meat_type: Some(MeatType::Layered),
            most_common_meat_protein: Some(MeatProtein::Beef),
            most_common_meat_seasoning: Some(MeatSeasoning::Seasoned),
            most_common_spice_level: Some(SpiceLevel::Spicy),
            most_common_yoghurt_sauce: true,
            ..AggregatedView::default()
        }
    }

    #[test]
    fn test_no_filters_match_everything() {
        let filters = AttributeFilters::default();
        assert!(filters.is_empty());
        assert!(filters.matches(&view()));
        assert!(filters.matches(&AggregatedView::default()));
    }

    #[test]
    fn test_or_within_group() {
        let filters = AttributeFilters {
            bread_fluffy: true,
            bread_sesame: true,
            ..AttributeFilters::default()
        };
        assert!(filters.matches(&view()));

        let filters = AttributeFilters {
            meat_chicken: true,
            meat_mixed: true,
            ..AttributeFilters::default()
        };
        assert!(!filters.matches(&view()));
    }

    #[test]
    fn test_conflicting_groups_exclude() {
        // Layered matches its group, but chicken fails the protein group
        let filters = AttributeFilters {
            meat_layered: true,
            meat_chicken: true,
            ..AttributeFilters::default()
        };
        assert!(!filters.matches(&view()));
    }

    #[test]
    fn test_must_have_flags() {
        let yoghurt = AttributeFilters {
            yoghurt_sauce: true,
            ..AttributeFilters::default()
        };
        assert!(yoghurt.matches(&view()));

        let garlic = AttributeFilters {
            garlic_sauce: true,
            ..AttributeFilters::default()
        };
        assert!(!garlic.matches(&view()));

        let onions = AttributeFilters {
            has_onions: true,
            ..AttributeFilters::default()
        };
        assert!(!onions.matches(&view()));
    }

    #[test]
    fn test_spice_and_phosphate_groups() {
        let filters = AttributeFilters {
            mild: true,
            ..AttributeFilters::default()
        };
        assert!(!filters.matches(&view()));

        let filters = AttributeFilters {
            seasoning_phosphate: true,
            seasoning_seasoned: true,
            spicy: true,
            ..AttributeFilters::default()
        };
        assert!(filters.matches(&view()));
    }

    #[test]
    fn test_zero_review_restaurant_fails_any_filter() {
        let filters = AttributeFilters {
            meat_minced: true,
            ..AttributeFilters::default()
        };
        assert!(!filters.matches(&AggregatedView::default()));
    }

    #[test]
    fn test_sort_by_param() {
        assert_eq!(SortBy::from_param("reviews"), SortBy::Reviews);
        assert_eq!(SortBy::from_param("rating"), SortBy::Rating);
        assert_eq!(SortBy::from_param("bogus"), SortBy::Rating);
    }

    fn parse_filters(query: &str) -> AttributeFilters {
        let uri: axum::http::Uri = format!("/api/search?{}", query).parse().unwrap();
        axum::extract::Query::<AttributeFilters>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_filters_from_query_string() {
        let filters = parse_filters("breadSesame=true&meatBeef=on&spicy=false&unrelated=x");
        assert!(filters.bread_sesame);
        assert!(filters.meat_beef);
        assert!(!filters.spicy);
        assert!(parse_filters("").is_empty());
    }

    async fn seeded_pool() -> SqlitePool {
        use doener_common::db::{restaurants::insert_restaurant, users::upsert_user};
        use doener_common::models::{RestaurantInput, User};

        let pool = doener_common::db::init_in_memory().await.unwrap();
        upsert_user(
            &pool,
            &User {
                id: "u1".to_string(),
                email: "u1@example.com".to_string(),
                name: "U1".to_string(),
                is_admin: false,
            },
        )
        .await
        .unwrap();
        insert_restaurant(
            &pool,
            "u1",
            &RestaurantInput {
                name: "Öz Grill".to_string(),
                city: "Berlin".to_string(),
                country: "DE".to_string(),
                latitude: 52.5,
                longitude: 13.4,
                doener_image: None,
            },
        )
        .await
        .unwrap();
        pool
    }

    fn request(location: &str) -> SearchRequest {
        SearchRequest {
            location: location.to_string(),
            ..SearchRequest::default()
        }
    }

    #[tokio::test]
    async fn test_query_length_threshold() {
        let pool = seeded_pool().await;
        let files = FileUrlResolver::new(pool.clone(), None, "s".to_string(), 60);

        for short in ["B", "Ö", " B "] {
            assert!(search_restaurants(&pool, &files, &request(short)).await.is_empty());
        }
        assert_eq!(search_restaurants(&pool, &files, &request("Be")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_short_query_never_touches_store() {
        use std::time::Duration;
        use tokio::time::timeout;

        // The in-memory pool has a single connection; holding it blocks any query
        let pool = seeded_pool().await;
        let files = FileUrlResolver::new(pool.clone(), None, "s".to_string(), 60);
        let held = pool.acquire().await.unwrap();

        let short = timeout(Duration::from_millis(200), search_restaurants(&pool, &files, &request("B"))).await;
        assert_eq!(short.map(|results| results.len()).ok(), Some(0));

        let long = timeout(Duration::from_millis(200), search_restaurants(&pool, &files, &request("Berlin"))).await;
        assert!(long.is_err(), "a real search waits for the held connection");

        drop(held);
    }

    fn result(id: i64, average_rating: Option<f64>, review_count: i64) -> RestaurantResult {
        RestaurantResult {
            listing: ListingView {
                id,
                name: format!("Imbiss {}", id),
                doener_image: None,
                city: "Berlin".to_string(),
                country: "DE".to_string(),
                latitude: 52.5,
                longitude: 13.4,
                added_by: "u1".to_string(),
                review_count,
                average_rating,
            },
            criteria: AggregatedView {
                average_rating,
                review_count: review_count as usize,
                ..AggregatedView::default()
            },
        }
    }

    #[test]
    fn test_rating_sort_breaks_ties_on_review_count() {
        let mut results = vec![
            result(1, Some(4.0), 1),
            result(2, None, 9),
            result(3, Some(4.0), 5),
            result(4, Some(4.5), 1),
            result(5, Some(4.0), 5),
        ];
        results.sort_by(by_rating);

        let ids: Vec<i64> = results.iter().map(|r| r.listing.id).collect();
        // Equal averages: more reviews first, then the original order
        assert_eq!(ids, vec![4, 3, 5, 1, 2]);
    }

    #[tokio::test]
    async fn test_store_error_yields_empty() {
        let pool = doener_common::db::init_in_memory().await.unwrap();
        let files = FileUrlResolver::new(pool.clone(), None, "s".to_string(), 60);
        pool.close().await;

        let request = SearchRequest {
            location: "Berlin".to_string(),
            ..SearchRequest::default()
        };
        assert!(search_restaurants(&pool, &files, &request).await.is_empty());
    }
}
