use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/local/register", post(handlers::register))
        .route("/api/auth/local", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/users/me", get(handlers::me))
}
