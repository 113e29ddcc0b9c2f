pub mod activities;
pub mod auth;
pub mod email;
pub mod health;
pub mod profiles;
pub mod vouchers;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::state::AppState;

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// The full HTTP surface, ready to serve.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(profiles::router())
        .merge(activities::router())
        .merge(vouchers::router())
        .merge(email::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
