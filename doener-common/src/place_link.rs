//! Shared map link parsing
//!
//! Extracts a place name and coordinates from links shared out of a maps
//! app, e.g. `https://www.google.com/maps/place/Name/@52.50,13.39,15z`.
//! Short links (`maps.app.goo.gl/...`) are not followed and parse to a name-
//! and coordinate-less result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::validate_coordinates;

static PLACE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"/place/([^/]+)").expect("valid regex"));

/// Coordinate formats, applied in order; a later match overrides an earlier one
static COORDINATE_FORMATS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"@(-?\d+\.?\d*),(-?\d+\.?\d*)").expect("valid regex"),
        Regex::new(r"[?&]q=(-?\d+\.?\d*),(-?\d+\.?\d*)").expect("valid regex"),
        Regex::new(r"!3d(-?\d+\.?\d*)!4d(-?\d+\.?\d*)").expect("valid regex"),
    ]
});

/// What a shared link tells about a place
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceInfo {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn decode_name(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Parse a shared map link
///
/// Returns `None` only when the link carries coordinates outside
/// [-90, 90] x [-180, 180]. Links without recognizable parts parse to
/// an all-absent [`PlaceInfo`].
pub fn parse_place_link(url: &str) -> Option<PlaceInfo> {
    let name = if url.contains("/place/") {
        PLACE_NAME.captures(url).map(|caps| decode_name(&caps[1]))
    } else {
        None
    };

    let mut coordinates = None;
    for format in COORDINATE_FORMATS.iter() {
        if let Some(caps) = format.captures(url) {
            if let (Ok(latitude), Ok(longitude)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) {
                coordinates = Some((latitude, longitude));
            }
        }
    }

    if let Some((latitude, longitude)) = coordinates {
        if validate_coordinates(latitude, longitude).is_err() {
            return None;
        }
    }

    Some(PlaceInfo {
        name,
        latitude: coordinates.map(|(lat, _)| lat),
        longitude: coordinates.map(|(_, lng)| lng),
    })
}
