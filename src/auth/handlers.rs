use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::{accounts, session};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{bearer_or_cookie_token, AppJson, CurrentUser};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn session_response(state: &AppState, status: StatusCode, user: &User) -> AppResult<Response> {
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &user.id, hours)?;
    let body = serde_json::json!({ "token": token, "user": user });

    Ok((
        status,
        [(
            header::SET_COOKIE,
            session_cookie(&state.config.auth.cookie_name, &token, hours),
        )],
        Json(body),
    )
        .into_response())
}

// -- Handlers --

/// POST /api/auth/local/register: create an account and open a session.
/// The first account created becomes the admin.
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<Response> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    if req.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    let email = req
        .email
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    if let Some(ref email) = email {
        if !email.contains('@') {
            return Err(AppError::BadRequest("Invalid email address".into()));
        }
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let user = accounts::create_user(&state.db, &username, email.as_deref(), &password_hash)?;

    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User registered");
    session_response(&state, StatusCode::CREATED, &user)
}

/// POST /api/auth/local: password login by username or email.
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Response> {
    let identifier = req.identifier.trim();
    if identifier.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "identifier and password are required".into(),
        ));
    }

    let user = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1 OR email = lower(?1)",
            params![identifier],
            User::from_row,
        )
        .optional()?
    };

    let user = user.ok_or_else(|| AppError::BadRequest("Invalid identifier or password".into()))?;
    let hash = user.password_hash.as_deref().unwrap_or_default();
    if !bcrypt::verify(&req.password, hash).unwrap_or(false) {
        return Err(AppError::BadRequest("Invalid identifier or password".into()));
    }

    session_response(&state, StatusCode::OK, &user)
}

/// POST /api/auth/logout: delete the current session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = bearer_or_cookie_token(&headers, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(cookie_name))],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response())
}

/// GET /api/users/me
pub async fn me(user: CurrentUser) -> Json<User> {
    Json(user.0)
}
