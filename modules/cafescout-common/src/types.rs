use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::FilterState;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Places ---

/// A candidate place normalized from the search provider. Identity is the
/// provider-assigned `place_id`; `filter_matches` is attached during ranking
/// and is presentation data, not identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    pub vicinity: Option<String>,
    /// Provider type tags (e.g. "cafe", "bakery"); matcher signal.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub location: Option<GeoPoint>,
    pub maps_link: String,
    #[serde(default)]
    pub filter_matches: BTreeMap<String, bool>,
}

impl Place {
    /// Count of include-state filters this place matched. Zero until the
    /// ranker has populated `filter_matches`.
    pub fn match_count(&self, include: &[&str]) -> usize {
        include
            .iter()
            .filter(|key| self.filter_matches.get(**key).copied().unwrap_or(false))
            .count()
    }
}

// --- Conversation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation. The place list, resolved location, and filter
/// echo only appear on assistant turns produced by a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub places: Option<Vec<Place>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterState>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            places: None,
            location: None,
            filters: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            places: None,
            location: None,
            filters: None,
        }
    }
}

/// Append-only turn history for one session id, owned by the session table.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub turns: Vec<Turn>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            last_activity: Utc::now(),
        }
    }
}

/// Most recent resolved location attached to any prior search turn. Feeds
/// the "what about over there" style follow-up that omits a location.
pub fn last_resolved_location(turns: &[Turn]) -> Option<&str> {
    turns.iter().rev().find_map(|turn| turn.location.as_deref())
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_seattle_to_portland_is_roughly_230km() {
        let seattle = GeoPoint { lat: 47.6062, lng: -122.3321 };
        let portland = GeoPoint { lat: 45.5152, lng: -122.6784 };
        let d = haversine_km(seattle, portland);
        assert!(d > 220.0 && d < 240.0, "got {d}");
    }

    #[test]
    fn haversine_identical_points_is_zero() {
        let p = GeoPoint { lat: 47.6, lng: -122.3 };
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn last_resolved_location_picks_most_recent() {
        let mut convo = Conversation::new();
        let mut first = Turn::assistant("found places");
        first.location = Some("Seattle".to_string());
        convo.turns.push(first);
        convo.turns.push(Turn::user("what about Ballard?"));
        let mut second = Turn::assistant("more places");
        second.location = Some("Ballard".to_string());
        convo.turns.push(second);

        assert_eq!(last_resolved_location(&convo.turns), Some("Ballard"));
    }
}
