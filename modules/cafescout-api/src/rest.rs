use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use cafescout_common::{CafeScoutError, FilterState, Place};

use crate::AppState;

// --- Request/response shapes ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    message: String,
    #[serde(default)]
    filter_states: FilterState,
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseBody {
    response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    places: Option<Vec<Place>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<FilterState>,
    session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PlacesQuery {
    location: Option<String>,
    place_type: Option<String>,
    /// Comma-separated filter keys, applied as include-state.
    filters: Option<String>,
}

// --- Handlers ---

pub async fn api_health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

pub async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> impl IntoResponse {
    let message = body.message.trim().to_string();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Message is required"})),
        )
            .into_response();
    }

    let session_id = body
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| "default".to_string());

    info!(session_id = %session_id, "Chat request");

    let outcome = state
        .recommender
        .handle_turn(&session_id, &message, &body.filter_states)
        .await;

    Json(ChatResponseBody {
        response: outcome.response,
        places: outcome.places,
        location: outcome.location,
        filters: outcome.filters,
        session_id,
    })
    .into_response()
}

pub async fn api_places(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlacesQuery>,
) -> impl IntoResponse {
    let Some(location) = params.location.filter(|l| !l.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Location is required"})),
        )
            .into_response();
    };

    let place_type = params
        .place_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "cafe".to_string());

    let filters = match params.filters.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(csv) => match FilterState::including(csv.split(',').map(str::trim)) {
            Ok(filters) => filters,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})))
                    .into_response();
            }
        },
        None => FilterState::new(),
    };

    match state
        .recommender
        .direct_search(&location, &place_type, &filters)
        .await
    {
        Ok((resolved, places)) => {
            let count = places.len();
            Json(json!({"location": resolved, "places": places, "count": count})).into_response()
        }
        Err(CafeScoutError::LocationNotFound(loc)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Could not resolve location '{loc}'")})),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Places search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Something went wrong. Please try again."})),
            )
                .into_response()
        }
    }
}
