pub mod error;
pub mod types;

pub use error::{MapsError, Result};
pub use types::{Geometry, LatLng, PlaceSource, RawPlace, ResolvedLocation};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use types::{DetailsResponse, GeocodeResponse, NearbyResponse};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Client for the Google Maps web services consumed by the recommender:
/// geocoding, nearby search, and place-photo lookup.
#[derive(Clone)]
pub struct GoogleMapsClient {
    http: reqwest::Client,
    key: String,
    base_url: String,
}

impl GoogleMapsClient {
    pub fn new(key: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build HTTP client"),
            key: key.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut params: Vec<(&str, &str)> = query.to_vec();
        params.push(("key", &self.key));

        let response = self.http.get(&url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MapsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Maps-provider status fields ride inside a 200 body; anything other
    /// than OK or ZERO_RESULTS is a provider failure.
    fn check_status(status: &str, error_message: Option<String>) -> Result<()> {
        match status {
            "OK" | "ZERO_RESULTS" => Ok(()),
            code => Err(MapsError::Status {
                code: code.to_string(),
                message: error_message.unwrap_or_default(),
            }),
        }
    }

    /// Displayable URL for a photo reference. The key rides in the URL, as
    /// the provider requires for direct image fetches.
    fn photo_url(&self, reference: &str) -> String {
        format!(
            "{}/place/photo?maxwidth=400&maxheight=300&photo_reference={}&key={}",
            self.base_url, reference, self.key
        )
    }
}

/// Run a provider call, retrying exactly once after a short backoff when the
/// failure is transient (5xx, rate limit). 4xx and denied requests surface
/// immediately.
async fn with_single_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_transient() => {
            warn!(error = %err, "Transient maps failure, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            op().await
        }
        Err(err) => Err(err),
    }
}

#[async_trait]
impl PlaceSource for GoogleMapsClient {
    async fn resolve_location(&self, text: &str) -> Result<Option<ResolvedLocation>> {
        debug!(location = text, "Geocoding location");

        let response: GeocodeResponse = with_single_retry(|| async move {
            self.get_json("geocode/json", &[("address", text)]).await
        })
        .await?;

        Self::check_status(&response.status, response.error_message)?;

        Ok(response.results.into_iter().next().map(|result| {
            debug!(address = %result.formatted_address, "Geocoded successfully");
            ResolvedLocation {
                coords: result.geometry.location,
                formatted_address: result.formatted_address,
            }
        }))
    }

    async fn nearby_search(
        &self,
        center: LatLng,
        place_type: &str,
        keyword: Option<&str>,
        radius_m: u32,
    ) -> Result<Vec<RawPlace>> {
        let location = format!("{},{}", center.lat, center.lng);
        let radius = radius_m.to_string();
        let mut query = vec![
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("type", place_type),
        ];
        if let Some(keyword) = keyword {
            query.push(("keyword", keyword));
        }

        debug!(place_type, radius_m, "Nearby search");

        let query = &query;
        let response: NearbyResponse = with_single_retry(|| async move {
            self.get_json("place/nearbysearch/json", query).await
        })
        .await?;

        Self::check_status(&response.status, response.error_message)?;

        debug!(count = response.results.len(), "Nearby search results");
        Ok(response.results)
    }

    async fn photo_urls(&self, place_id: &str, max: usize) -> Result<Vec<String>> {
        let response: DetailsResponse = self
            .get_json(
                "place/details/json",
                &[("place_id", place_id), ("fields", "photo")],
            )
            .await?;

        Self::check_status(&response.status, response.error_message)?;

        Ok(response
            .result
            .map(|details| {
                details
                    .photos
                    .iter()
                    .take(max)
                    .map(|photo| self.photo_url(&photo.photo_reference))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn transient_failure_is_attempted_exactly_twice() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<()> = with_single_retry(|| async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(MapsError::Api {
                status: 503,
                message: "backend overloaded".to_string(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_is_never_retried() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<()> = with_single_retry(|| async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(MapsError::Api {
                status: 403,
                message: "forbidden".to_string(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_surfaces_the_second_attempt() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result = with_single_retry(|| async move {
            match attempts.fetch_add(1, Ordering::SeqCst) {
                0 => Err(MapsError::Status {
                    code: "OVER_QUERY_LIMIT".to_string(),
                    message: String::new(),
                }),
                _ => Ok(7),
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn photo_url_carries_reference_and_key() {
        let client = GoogleMapsClient::new("test-key", Duration::from_secs(1));
        let url = client.photo_url("ref-abc");
        assert!(url.contains("photo_reference=ref-abc"));
        assert!(url.contains("key=test-key"));
        assert!(url.contains("maxwidth=400"));
    }

    #[test]
    fn provider_status_check_accepts_ok_and_zero_results() {
        assert!(GoogleMapsClient::check_status("OK", None).is_ok());
        assert!(GoogleMapsClient::check_status("ZERO_RESULTS", None).is_ok());
    }

    #[test]
    fn provider_status_check_rejects_denial() {
        let err = GoogleMapsClient::check_status(
            "REQUEST_DENIED",
            Some("bad key".to_string()),
        )
        .unwrap_err();
        match err {
            MapsError::Status { code, message } => {
                assert_eq!(code, "REQUEST_DENIED");
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
