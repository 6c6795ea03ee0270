//! Point of interest records

use crate::GeoPoint;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Ordered, duplicate-free category list (most POIs carry one or two)
pub type Categories = SmallVec<[String; 2]>;

/// A labelled location with descriptive metadata
///
/// Records are built once at load time and never mutated afterwards. There
/// is no synthetic id: two POIs with the same title and location are the
/// same entity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointOfInterest {
    pub location: GeoPoint,
    pub title: String,
    /// May contain inline markup (`<h3>`/`<p>` from XML sections)
    pub description: String,
    /// At least one category, in source order
    pub categories: Categories,
    pub image: Option<String>,
    pub audio: Option<String>,
    pub directions: Option<String>,
}

impl PointOfInterest {
    /// Identity check used to resolve map annotations back to records
    pub fn is_identified_by(&self, title: &str, location: GeoPoint) -> bool {
        self.title == title && self.location.same_location(&location)
    }

    /// The first (primary) category, used for marker styling
    pub fn primary_category(&self) -> &str {
        self.categories.first().map(String::as_str).unwrap_or_default()
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// Split a delimited category field, trimming tokens and dropping empty or
/// repeated ones (first occurrence wins)
pub fn parse_categories<'a>(parts: impl IntoIterator<Item = &'a str>) -> Categories {
    let mut categories = Categories::new();
    for token in parts.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        if !categories.iter().any(|c| c == token) {
            categories.push(token.to_string());
        }
    }
    categories
}

/// Sorted, distinct categories across all POIs (for category pickers)
pub fn all_categories(pois: &[PointOfInterest]) -> Vec<String> {
    pois.iter()
        .flat_map(|poi| poi.categories.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(title: &str, lat: f64, lon: f64, categories: &[&str]) -> PointOfInterest {
        PointOfInterest {
            location: GeoPoint::new(lat, lon),
            title: title.to_string(),
            description: String::new(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            image: None,
            audio: None,
            directions: None,
        }
    }

    #[test]
    fn test_parse_categories() {
        let cats = parse_categories("Historic; Museum ;;Historic; ".split(';'));
        assert_eq!(cats.as_slice(), ["Historic", "Museum"]);
        assert!(parse_categories(" ; ".split(';')).is_empty());
    }

    #[test]
    fn test_identity() {
        let cathedral = poi("Cathedral", 51.0606, -1.3131, &["Historic"]);
        assert!(cathedral.is_identified_by("Cathedral", GeoPoint::new(51.0606, -1.3131)));
        assert!(!cathedral.is_identified_by("Cathedral", GeoPoint::new(51.0606, -1.3132)));
        assert!(!cathedral.is_identified_by("Great Hall", GeoPoint::new(51.0606, -1.3131)));
    }

    #[test]
    fn test_all_categories_sorted_and_distinct() {
        let pois = vec![
            poi("A", 0.0, 0.0, &["Park", "Historic"]),
            poi("B", 0.0, 0.0, &["Museum"]),
            poi("C", 0.0, 0.0, &["Historic"]),
        ];
        assert_eq!(all_categories(&pois), vec!["Historic", "Museum", "Park"]);
        assert_eq!(pois[0].primary_category(), "Park");
        assert!(pois[0].has_category("Historic"));
    }
}
