use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAiChat;
use cafescout_agent::{IntentResolver, Recommender, SearchAdapter};
use cafescout_common::Config;
use maps_client::GoogleMapsClient;

mod rest;

pub struct AppState {
    pub recommender: Recommender,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cafescout=info".parse()?))
        .init();

    let config = Config::from_env();

    let model = Arc::new(OpenAiChat::new(
        &config.github_token,
        &config.model_name,
        &config.openai_base_url,
        config.reasoning_timeout,
    ));
    let maps = Arc::new(GoogleMapsClient::new(
        &config.google_maps_api_key,
        config.maps_timeout,
    ));

    let resolver = IntentResolver::new(model, &config);
    let adapter = SearchAdapter::new(maps, &config);
    let state = Arc::new(AppState {
        recommender: Recommender::new(resolver, adapter, &config),
    });

    let app = Router::new()
        .route("/api/health", get(rest::api_health))
        .route("/api/chat", post(rest::api_chat))
        .route("/api/places", get(rest::api_places))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = format!("{}:{}", config.host, config.port);
    info!(%addr, "CafeScout API listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
