use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub coords: LatLng,
    pub formatted_address: String,
}

/// A place exactly as the provider shapes it, before any domain
/// normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlace {
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub user_ratings_total: Option<u32>,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

/// The consumed maps-provider boundary: location resolution, nearby search
/// in provider relevance order, and photo-reference resolution. The pipeline
/// depends only on this shape.
#[async_trait]
pub trait PlaceSource: Send + Sync {
    /// Resolve free-text to coordinates. `Ok(None)` means the provider had
    /// no match at all (distinct from a provider failure).
    async fn resolve_location(&self, text: &str) -> Result<Option<ResolvedLocation>>;

    async fn nearby_search(
        &self,
        center: LatLng,
        place_type: &str,
        keyword: Option<&str>,
        radius_m: u32,
    ) -> Result<Vec<RawPlace>>;

    /// Displayable photo URLs for a place, capped at `max`.
    async fn photo_urls(&self, place_id: &str, max: usize) -> Result<Vec<String>>;
}

// --- Wire envelopes ---

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResult {
    pub geometry: Geometry,
    pub formatted_address: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NearbyResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<RawPlace>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailsResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<PlaceDetails>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaceDetails {
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoRef {
    pub photo_reference: String,
}
