use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// One rejected entry of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub index: usize,
    pub local_id: String,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::NotFound(what) => what.clone(),
            AppError::Unauthorized => "You must be logged in".to_string(),
            AppError::Forbidden(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(_) => "Validation failed".to_string(),
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream provider error");
                msg.clone()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                "Internal server error".to_string()
            }
        };

        let mut body = serde_json::json!({
            "error": {
                "status": status.as_u16(),
                "message": message,
            }
        });
        if let AppError::Validation(errors) = &self {
            body["error"]["errors"] = serde_json::json!(errors);
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    async fn response_json(err: AppError) -> serde_json::Value {
        let body = err.into_response().into_body().collect().await.unwrap();
        serde_json::from_slice(&body.to_bytes()).unwrap()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(
            response_status(AppError::NotFound("Baby profile not found".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn forbidden_returns_403() {
        assert_eq!(
            response_status(AppError::Forbidden("nope".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_returns_502() {
        assert_eq!(
            response_status(AppError::Upstream("provider down".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_lists_field_errors() {
        let json = response_json(AppError::Validation(vec![FieldError {
            index: 2,
            local_id: "abc".into(),
            error: "timestamp is required".into(),
        }]))
        .await;
        assert_eq!(json["error"]["status"], 400);
        assert_eq!(json["error"]["message"], "Validation failed");
        assert_eq!(json["error"]["errors"][0]["index"], 2);
        assert_eq!(json["error"]["errors"][0]["local_id"], "abc");
    }

    #[tokio::test]
    async fn internal_message_is_not_leaked() {
        let json = response_json(AppError::Internal("secret detail".into())).await;
        assert_eq!(json["error"]["message"], "Internal server error");
    }
}
