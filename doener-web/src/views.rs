//! Response payloads shared by several endpoints
//!
//! Stored rows carry file ids; these views carry resolved image URLs.

use doener_common::db::reviews::AuthoredReview;
use doener_common::models::{Restaurant, Review};
use doener_common::FileUrlResolver;
use serde::Serialize;

/// Restaurant listing with its image resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    pub id: i64,
    pub name: String,
    pub doener_image: Option<String>,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub added_by: String,
    pub review_count: i64,
    pub average_rating: Option<f64>,
}

impl ListingView {
    pub async fn build(restaurant: Restaurant, files: &FileUrlResolver) -> Self {
        let doener_image = files.resolve(restaurant.doener_image.as_deref()).await;

        ListingView {
            id: restaurant.id,
            name: restaurant.name,
            doener_image,
            city: restaurant.city,
            country: restaurant.country,
            latitude: restaurant.latitude,
            longitude: restaurant.longitude,
            added_by: restaurant.added_by,
            review_count: restaurant.review_count,
            average_rating: restaurant.average_rating,
        }
    }
}

/// Review with its image resolved and, where known, the author's name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl ReviewView {
    pub async fn build(review: Review, files: &FileUrlResolver) -> Self {
        let image_url = files.resolve(review.image_file_id.as_deref()).await;
        ReviewView {
            review,
            image_url,
            author_name: None,
        }
    }

    pub async fn with_author(authored: AuthoredReview, files: &FileUrlResolver) -> Self {
        let mut view = ReviewView::build(authored.review, files).await;
        view.author_name = authored.author_name;
        view
    }
}
