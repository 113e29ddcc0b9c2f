use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::email::bootstrap;
use crate::email::templates::{self, Registration};
use crate::email::EmailMessage;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, AppJson, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/email/send-test", post(send_test))
        .route("/api/email/send-registration", post(send_registration))
        .route("/api/email/settings", get(settings))
}

fn render_failed(e: askama::Error) -> AppError {
    AppError::Internal(format!("Failed to render email: {}", e))
}

async fn deliver(state: &AppState, message: &EmailMessage) -> AppResult<()> {
    state.mailer.send(message).await.map_err(|e| {
        tracing::error!(to = %message.to, error = %e, "Failed to send email");
        AppError::Upstream(e.to_string())
    })?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SendTestRequest {
    pub to: Option<String>,
}

/// POST /api/email/send-test (admin only)
async fn send_test(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    AppJson(req): AppJson<SendTestRequest>,
) -> AppResult<Json<Value>> {
    let to = req
        .to
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Email address is required".into()))?;

    let message = templates::test_email(&to).map_err(render_failed)?;
    deliver(&state, &message).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Test email sent successfully to {}", to),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRegistrationRequest {
    pub to: Option<String>,
    pub first_name: Option<String>,
    pub verification_link: Option<String>,
}

/// POST /api/email/send-registration
///
/// Users may only address their own account; admins may send to anyone.
async fn send_registration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<SendRegistrationRequest>,
) -> AppResult<Json<Value>> {
    let (Some(to), Some(link)) = (
        req.to.filter(|t| !t.trim().is_empty()),
        req.verification_link.filter(|l| !l.trim().is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: to, verificationLink".into(),
        ));
    };
    let own_address = user
        .email
        .as_deref()
        .is_some_and(|email| email.eq_ignore_ascii_case(to.trim()));
    if !user.is_admin && !own_address {
        return Err(AppError::Forbidden(
            "You can only send a registration email to your own address".into(),
        ));
    }

    let message = templates::registration_email(
        &state.config.email,
        &Registration {
            to: &to,
            first_name: req.first_name.as_deref(),
            verification_link: &link,
            unsubscribe_link: None,
        },
    )
    .map_err(render_failed)?;
    deliver(&state, &message).await?;

    tracing::info!(to = %to, "Registration email sent");
    Ok(Json(json!({
        "success": true,
        "message": format!("Registration email sent successfully to {}", to),
    })))
}

/// GET /api/email/settings (admin only)
async fn settings(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "data": bootstrap::load_settings(&state.db)? })))
}
