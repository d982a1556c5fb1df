//! Restaurant aggregation
//!
//! Derives the "typical döner" of a restaurant from its reviews: majority
//! booleans, plurality categoricals, and the newest image and notes.

use doener_common::db::reviews;
use doener_common::models::{MeatProtein, MeatSeasoning, MeatType, Review, SpiceLevel};
use doener_common::tally::{majority_flag, tally_by};
use doener_common::{FileUrlResolver, Result, Tally};
use serde::Serialize;
use sqlx::SqlitePool;

/// Derived per-restaurant criteria; never persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedView {
    pub most_common_bread_sesame: bool,
    pub most_common_bread_fluffy: bool,
    pub most_common_bread_crispy: bool,
    pub most_common_meat_type: Option<MeatType>,
    pub most_common_meat_protein: Option<MeatProtein>,
    pub most_common_meat_seasoning: Option<MeatSeasoning>,
    pub most_common_has_onions: bool,
    pub most_common_spice_level: Option<SpiceLevel>,
    pub most_common_yoghurt_sauce: bool,
    pub most_common_garlic_sauce: bool,
    /// Resolved URL of the newest review image
    pub latest_review_image: Option<String>,
    /// Notes of the newest review
    pub latest_review_notes: Option<String>,
    #[serde(skip)]
    pub review_count: usize,
    /// Mean score over rated reviews
    #[serde(skip)]
    pub average_rating: Option<f64>,
}

fn plurality<K: PartialEq + Copy>(tally: &Tally<K>) -> Option<K> {
    tally.most_common().copied()
}

/// Aggregate reviews ordered newest first
///
/// The image is left unresolved; see [`latest_image_id`].
pub fn summarize(reviews: &[Review]) -> AggregatedView {
    if reviews.is_empty() {
        return AggregatedView::default();
    }

    let scores: Vec<f64> = reviews.iter().filter_map(|r| r.rating.map(|rating| rating.score())).collect();
    let average_rating = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

    AggregatedView {
        most_common_bread_sesame: majority_flag(reviews, |r| r.bread_has_sesame),
        most_common_bread_fluffy: majority_flag(reviews, |r| r.bread_fluffy_inside),
        most_common_bread_crispy: majority_flag(reviews, |r| r.bread_crispy_outside),
        most_common_meat_type: plurality(&tally_by(reviews, |r| r.meat_type)),
        most_common_meat_protein: plurality(&tally_by(reviews, |r| r.meat_protein)),
        most_common_meat_seasoning: plurality(&tally_by(reviews, |r| r.meat_seasoning)),
        most_common_has_onions: majority_flag(reviews, |r| r.has_onions),
        most_common_spice_level: plurality(&tally_by(reviews, |r| r.spice_level)),
        most_common_yoghurt_sauce: majority_flag(reviews, |r| r.has_yoghurt_sauce),
        most_common_garlic_sauce: majority_flag(reviews, |r| r.has_garlic_sauce),
        latest_review_image: None,
        latest_review_notes: reviews[0].notes.clone(),
        review_count: reviews.len(),
        average_rating,
    }
}

/// Image of the newest review that has one
pub fn latest_image_id(reviews: &[Review]) -> Option<&str> {
    reviews.iter().find_map(|r| r.image_file_id.as_deref())
}

/// Aggregate reviews (newest first) and resolve the latest image
pub async fn aggregate(reviews: &[Review], files: &FileUrlResolver) -> AggregatedView {
    let mut view = summarize(reviews);
    view.latest_review_image = files.resolve(latest_image_id(reviews)).await;
    view
}

/// Load a restaurant's reviews and aggregate them
pub async fn aggregate_restaurant(
    pool: &SqlitePool,
    files: &FileUrlResolver,
    restaurant_id: i64,
) -> Result<AggregatedView> {
    let reviews = reviews::list_for_restaurant(pool, restaurant_id).await?;
    Ok(aggregate(&reviews, files).await)
}
