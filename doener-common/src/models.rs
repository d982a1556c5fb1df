//! Review and restaurant models
//!
//! Attribute values are closed enums. Strings coming from request bodies or
//! database rows are parsed at the boundary; nothing downstream handles raw
//! category labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Declares a categorical review attribute with its database spelling
macro_rules! attribute_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $db:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Parse the database/API spelling (case-insensitive)
            pub fn from_db_str(s: &str) -> Option<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($db => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Canonical database spelling
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $db,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_db_str())
            }
        }
    };
}

attribute_enum! {
    /// How the meat is prepared on the spit
    MeatType { Minced => "minced", Layered => "layered" }
}

attribute_enum! {
    /// Meat protein
    MeatProtein { Chicken => "chicken", Beef => "beef", Mixed => "mixed" }
}

attribute_enum! {
    /// Meat seasoning; `phosphate` marks processed meat
    MeatSeasoning { Pure => "pure", Seasoned => "seasoned", Phosphate => "phosphate" }
}

attribute_enum! {
    /// Spice level of the toppings
    SpiceLevel { Mild => "mild", Spicy => "spicy" }
}

// ========================================
// Ratings
// ========================================

/// Four-category rating, each 1 (sub average) to 4 (excellent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRatings {
    pub meat: u8,
    pub bread: u8,
    pub veggies: u8,
    pub sauce: u8,
}

/// Review rating
///
/// Serialized untagged: either a bare number (`4`) or an object with the
/// four category ratings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    /// Single overall value, 1 to 5 stars
    Stars(u8),
    /// Sub-ratings averaged into the score
    Categories(CategoryRatings),
}

impl Rating {
    /// Numeric score used for averages
    pub fn score(&self) -> f64 {
        match self {
            Rating::Stars(stars) => f64::from(*stars),
            Rating::Categories(c) => {
                f64::from(u16::from(c.meat) + u16::from(c.bread) + u16::from(c.veggies) + u16::from(c.sauce))
                    / 4.0
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        match self {
            Rating::Stars(stars) if !(1..=5).contains(stars) => Err(Error::InvalidInput(format!(
                "Rating must be between 1 and 5, got {}",
                stars
            ))),
            Rating::Categories(c) => {
                for (label, value) in [
                    ("meat", c.meat),
                    ("bread", c.bread),
                    ("veggies", c.veggies),
                    ("sauce", c.sauce),
                ] {
                    if !(1..=4).contains(&value) {
                        return Err(Error::InvalidInput(format!(
                            "{} rating must be between 1 and 4, got {}",
                            label, value
                        )));
                    }
                }
                Ok(())
            }
            Rating::Stars(_) => Ok(()),
        }
    }

    /// Rebuild from the nullable rating columns of a review row
    pub fn from_columns(
        overall: Option<i64>,
        meat: Option<i64>,
        bread: Option<i64>,
        veggies: Option<i64>,
        sauce: Option<i64>,
    ) -> Option<Self> {
        if let Some(stars) = overall {
            return u8::try_from(stars).ok().map(Rating::Stars);
        }
        match (meat, bread, veggies, sauce) {
            (Some(meat), Some(bread), Some(veggies), Some(sauce)) => Some(Rating::Categories(CategoryRatings {
                meat: u8::try_from(meat).ok()?,
                bread: u8::try_from(bread).ok()?,
                veggies: u8::try_from(veggies).ok()?,
                sauce: u8::try_from(sauce).ok()?,
            })),
            _ => None,
        }
    }
}

// ========================================
// Reviews
// ========================================

/// Fixed-shape attribute record submitted with a review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoenerAttributes {
    pub bread_has_sesame: bool,
    pub bread_fluffy_inside: bool,
    pub bread_crispy_outside: bool,
    pub meat_type: MeatType,
    pub meat_protein: MeatProtein,
    pub meat_seasoning: MeatSeasoning,
    pub has_onions: bool,
    pub spice_level: SpiceLevel,
    pub has_yoghurt_sauce: bool,
    pub has_garlic_sauce: bool,
}

/// Review body as submitted or edited by its author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    #[serde(flatten)]
    pub attributes: DoenerAttributes,
    pub rating: Rating,
    #[serde(default)]
    pub notes: Option<String>,
    /// Id of an already-uploaded file
    #[serde(default)]
    pub image_file_id: Option<String>,
}

impl ReviewInput {
    pub fn validate(&self) -> Result<()> {
        self.rating.validate()
    }

    /// Notes with blank input collapsed to absent
    pub fn normalized_notes(&self) -> Option<&str> {
        self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Stored review
///
/// Categorical attributes are optional on read: rows written under an older
/// schema revision may carry values that are no longer accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub restaurant_id: i64,
    pub user_id: String,
    pub bread_has_sesame: bool,
    pub bread_fluffy_inside: bool,
    pub bread_crispy_outside: bool,
    pub meat_type: Option<MeatType>,
    pub meat_protein: Option<MeatProtein>,
    pub meat_seasoning: Option<MeatSeasoning>,
    pub has_onions: bool,
    pub spice_level: Option<SpiceLevel>,
    pub has_yoghurt_sauce: bool,
    pub has_garlic_sauce: bool,
    pub rating: Option<Rating>,
    pub notes: Option<String>,
    pub image_file_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========================================
// Restaurants
// ========================================

/// Listing fields supplied when creating or editing a restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantInput {
    pub name: String,
    pub city: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub doener_image: Option<String>,
}

fn default_country() -> String {
    "DE".to_string()
}

impl RestaurantInput {
    pub fn validate(&self) -> Result<()> {
        let name_len = self.name.trim().chars().count();
        if !(2..=50).contains(&name_len) {
            return Err(Error::InvalidInput(
                "Restaurant name must be 2 to 50 characters".to_string(),
            ));
        }
        if self.city.trim().is_empty() {
            return Err(Error::InvalidInput("City is required".to_string()));
        }
        if self.country.chars().count() != 2 {
            return Err(Error::InvalidInput(format!(
                "Country must be a two-letter code, got {:?}",
                self.country
            )));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Reject coordinates outside [-90, 90] x [-180, 180]
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::InvalidInput(format!("Invalid latitude: {}", latitude)));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::InvalidInput(format!("Invalid longitude: {}", longitude)));
    }
    Ok(())
}

/// Stored restaurant listing
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    /// File id of the listing image
    pub doener_image: Option<String>,
    pub added_by: String,
    pub review_count: i64,
    pub average_rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cached review statistics of a restaurant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantStats {
    pub review_count: i64,
    /// Mean rating score, absent when there are no rated reviews
    pub average_rating: Option<f64>,
}

impl RestaurantStats {
    /// Recompute from the full rating set of a restaurant
    ///
    /// Reviews without a readable rating count towards `review_count` but not
    /// towards the average.
    pub fn from_ratings<'a>(ratings: impl IntoIterator<Item = Option<&'a Rating>>) -> Self {
        let mut review_count = 0i64;
        let mut rated = 0u32;
        let mut sum = 0.0;
        for rating in ratings {
            review_count += 1;
            if let Some(rating) = rating {
                rated += 1;
                sum += rating.score();
            }
        }

        RestaurantStats {
            review_count,
            average_rating: (rated > 0).then(|| sum / f64::from(rated)),
        }
    }
}

// ========================================
// Users and files
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

/// Uploaded file metadata; the bytes live in external storage under `key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_parse_is_case_insensitive() {
        assert_eq!(MeatType::from_db_str("Minced"), Some(MeatType::Minced));
        assert_eq!(SpiceLevel::from_db_str(" SPICY "), Some(SpiceLevel::Spicy));
        assert_eq!(MeatSeasoning::from_db_str("phosphate"), Some(MeatSeasoning::Phosphate));
    }

    #[test]
    fn test_legacy_values_are_rejected() {
        // lamb and the old "sour" kraut level belong to retired schema revisions
        assert_eq!(MeatProtein::from_db_str("lamb"), None);
        assert_eq!(SpiceLevel::from_db_str("sour"), None);
        assert_eq!(MeatType::from_db_str(""), None);
    }

    #[test]
    fn test_rating_json_shapes() {
        let stars: Rating = serde_json::from_str("4").unwrap();
        assert_eq!(stars, Rating::Stars(4));

        let categories: Rating =
            serde_json::from_str(r#"{"meat":4,"bread":3,"veggies":2,"sauce":3}"#).unwrap();
        assert_eq!(categories.score(), 3.0);
    }

    #[test]
    fn test_rating_ranges() {
        assert!(Rating::Stars(5).validate().is_ok());
        assert!(Rating::Stars(0).validate().is_err());
        assert!(Rating::Stars(6).validate().is_err());

        let over = Rating::Categories(CategoryRatings { meat: 5, bread: 1, veggies: 1, sauce: 1 });
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_rating_from_columns_prefers_overall() {
        assert_eq!(
            Rating::from_columns(Some(3), Some(1), Some(1), Some(1), Some(1)),
            Some(Rating::Stars(3))
        );
        assert_eq!(Rating::from_columns(None, Some(1), None, Some(1), Some(1)), None);
    }

    #[test]
    fn test_stats_from_ratings() {
        let ratings = [Rating::Stars(5), Rating::Stars(2)];
        let stats = RestaurantStats::from_ratings(ratings.iter().map(Some));
        assert_eq!(stats.review_count, 2);
        assert_eq!(stats.average_rating, Some(3.5));

        let empty = RestaurantStats::from_ratings(std::iter::empty());
        assert_eq!(empty.review_count, 0);
        assert_eq!(empty.average_rating, None);
    }

    #[test]
    fn test_review_input_flattens_attributes() {
        let input: ReviewInput = serde_json::from_str(
            r#"{
                "breadHasSesame": true,
                "breadFluffyInside": false,
                "breadCrispyOutside": true,
                "meatType": "layered",
                "meatProtein": "beef",
                "meatSeasoning": "seasoned",
                "hasOnions": true,
                "spiceLevel": "mild",
                "hasYoghurtSauce": true,
                "hasGarlicSauce": false,
                "rating": 5,
                "notes": "  "
            }"#,
        )
        .unwrap();

        assert_eq!(input.attributes.meat_type, MeatType::Layered);
        assert_eq!(input.normalized_notes(), None);
        assert!(input.image_file_id.is_none());
    }

    #[test]
    fn test_restaurant_input_validation() {
        let mut input = RestaurantInput {
            name: "Mustafa's".to_string(),
            city: "Berlin".to_string(),
            country: "DE".to_string(),
            latitude: 52.5,
            longitude: 13.4,
            doener_image: None,
        };
        assert!(input.validate().is_ok());

        input.latitude = 95.0;
        assert!(input.validate().is_err());

        input.latitude = 52.5;
        input.name = "M".to_string();
        assert!(input.validate().is_err());
    }
}
