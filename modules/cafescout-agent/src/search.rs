use std::sync::Arc;

use tracing::{debug, info, warn};

use cafescout_common::{CafeScoutError, Config, GeoPoint, Place};
use maps_client::{MapsError, PlaceSource, RawPlace};

/// A completed search: the resolved location plus normalized candidates in
/// provider relevance order, ready for the ranker.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub location: String,
    pub places: Vec<Place>,
}

/// Wraps the maps provider: resolves free-text locations, over-fetches
/// candidates for the ranker, and enriches them with photos best-effort.
#[derive(Clone)]
pub struct SearchAdapter {
    source: Arc<dyn PlaceSource>,
    radius_m: u32,
    candidate_pool: usize,
    max_photos: usize,
}

impl SearchAdapter {
    pub fn new(source: Arc<dyn PlaceSource>, config: &Config) -> Self {
        Self {
            source,
            radius_m: config.search_radius_m,
            candidate_pool: config.candidate_pool,
            max_photos: config.max_photos,
        }
    }

    /// Resolve the location, then fetch up to `candidate_pool` nearby places
    /// of the given type. Provider failures surface as `Provider`; an
    /// unresolvable location is `LocationNotFound`.
    pub async fn search(
        &self,
        location: &str,
        place_type: &str,
        keyword: Option<&str>,
    ) -> Result<SearchOutcome, CafeScoutError> {
        let resolved = self
            .source
            .resolve_location(location)
            .await
            .map_err(provider_err)?
            .ok_or_else(|| CafeScoutError::LocationNotFound(location.to_string()))?;

        info!(
            location,
            resolved = %resolved.formatted_address,
            place_type,
            "Searching nearby places"
        );

        let raw = self
            .source
            .nearby_search(resolved.coords, place_type, keyword, self.radius_m)
            .await
            .map_err(provider_err)?;

        let mut places: Vec<Place> = raw
            .into_iter()
            .take(self.candidate_pool)
            .filter_map(normalize_place)
            .collect();

        debug!(count = places.len(), "Normalized candidates");

        for place in &mut places {
            if place.place_id.is_empty() {
                continue;
            }
            // Photos are presentation sugar; a failed lookup degrades to an
            // empty list and never fails the search.
            match self.source.photo_urls(&place.place_id, self.max_photos).await {
                Ok(urls) => place.photo_urls = urls,
                Err(e) => warn!(place = %place.name, error = %e, "Photo lookup failed"),
            }
        }

        Ok(SearchOutcome {
            location: resolved.formatted_address,
            places,
        })
    }
}

fn provider_err(err: MapsError) -> CafeScoutError {
    CafeScoutError::Provider(err.to_string())
}

/// Convert a provider result into the domain model. Unnamed results carry no
/// usable signal and are dropped.
fn normalize_place(raw: RawPlace) -> Option<Place> {
    let name = raw.name?;
    let place_id = raw.place_id.unwrap_or_default();
    let location = raw.geometry.map(|g| GeoPoint {
        lat: g.location.lat,
        lng: g.location.lng,
    });

    let maps_link = maps_link(&place_id, &name, location);

    Some(Place {
        place_id,
        name,
        rating: raw.rating,
        user_ratings_total: raw.user_ratings_total,
        vicinity: raw.vicinity,
        types: raw.types,
        photo_urls: Vec::new(),
        location,
        maps_link,
        filter_matches: Default::default(),
    })
}

/// Deep link to the provider's map UI, preferring the stable place id.
fn maps_link(place_id: &str, name: &str, location: Option<GeoPoint>) -> String {
    if !place_id.is_empty() {
        return format!("https://maps.google.com/maps?q=place_id:{place_id}");
    }
    if let Some(point) = location {
        return format!(
            "https://maps.google.com/maps?q={}@{},{}",
            name.replace(' ', "+"),
            point.lat,
            point.lng
        );
    }
    format!("https://maps.google.com/maps?q={}", name.replace(' ', "+"))
}
