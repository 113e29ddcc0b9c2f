use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{format_timestamp, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, AppJson, CurrentUser};
use crate::state::AppState;
use crate::voucher::domain::{generate_code, validate_voucher, GenerateRequest};
use crate::voucher::repository as vouchers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/voucher-actions/redeem", post(redeem))
        .route("/api/voucher-actions/validate", post(validate))
        .route("/api/voucher-actions/generate", post(generate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub voucher_code: Option<String>,
    pub app_user_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/voucher-actions/redeem
///
/// `appUserId` is the caller's RevenueCat customer id. A user already linked
/// to a customer can only redeem for that customer.
async fn redeem(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<RedeemRequest>,
) -> AppResult<Json<Value>> {
    let (Some(code), Some(app_user_id)) = (non_empty(req.voucher_code), non_empty(req.app_user_id))
    else {
        return Err(AppError::BadRequest(
            "Missing required fields: voucherCode and appUserId are required".into(),
        ));
    };

    if user
        .revenuecat_customer_id
        .as_deref()
        .is_some_and(|linked| linked != app_user_id)
    {
        return Err(AppError::Forbidden(
            "appUserId does not belong to the current user".into(),
        ));
    }

    let voucher = vouchers::find_by_code(&state.db, &code)?
        .ok_or_else(|| AppError::NotFound("Voucher not found".into()))?;
    validate_voucher(&voucher, Some(app_user_id.as_str()), Utc::now())
        .map_err(|reason| AppError::BadRequest(reason.into()))?;

    state
        .entitlements
        .grant(&app_user_id, voucher.duration_months)
        .await
        .map_err(|e| {
            tracing::error!(voucher = %code, error = %e, "Entitlement grant failed");
            AppError::Upstream(
                "Failed to activate premium subscription. Please try again.".into(),
            )
        })?;

    let activated_at = now_timestamp();
    if !vouchers::mark_redeemed(&state.db, voucher.id, &activated_at)? {
        // Another request redeemed it between our check and this update
        tracing::warn!(voucher = %code, "Voucher redeemed concurrently");
        return Err(AppError::BadRequest("Voucher has already been used".into()));
    }

    if let Err(e) = vouchers::set_premium_for_user(&state.db, &user.id, &app_user_id) {
        tracing::warn!(user_id = %user.id, error = %e, "Could not update user premium status");
    }

    tracing::info!(
        voucher = %code,
        user_id = %user.id,
        app_user_id = %app_user_id,
        "Voucher redeemed"
    );
    Ok(Json(json!({
        "success": true,
        "message": "Voucher redeemed successfully! Premium access has been activated.",
        "data": {
            "duration_months": voucher.duration_months,
            "voucher_type": voucher.voucher_type,
            "activated_at": activated_at,
        }
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub voucher_code: Option<String>,
}

/// POST /api/voucher-actions/validate
async fn validate(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    AppJson(req): AppJson<ValidateRequest>,
) -> AppResult<Json<Value>> {
    let code = non_empty(req.voucher_code)
        .ok_or_else(|| AppError::BadRequest("Missing required field: voucherCode".into()))?;

    let Some(voucher) = vouchers::find_by_code(&state.db, &code)? else {
        return Ok(Json(json!({
            "valid": false,
            "error": "Voucher not found",
            "data": null,
        })));
    };

    Ok(Json(match validate_voucher(&voucher, None, Utc::now()) {
        Ok(()) => json!({
            "valid": true,
            "error": null,
            "data": {
                "type": voucher.voucher_type,
                "duration_months": voucher.duration_months,
                "expiry_date": voucher.expiry_date,
            }
        }),
        Err(reason) => json!({ "valid": false, "error": reason, "data": null }),
    }))
}

/// POST /api/voucher-actions/generate (admin only)
async fn generate(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<GenerateRequest>,
) -> AppResult<Json<Value>> {
    req.validate()
        .map_err(|reason| AppError::BadRequest(reason.into()))?;

    let now = Utc::now();
    let expiry_date = format_timestamp(now + Duration::days(req.expiry_days));
    let prefix = req.prefix.trim();
    let codes: Vec<String> = (0..req.count).map(|_| generate_code(prefix, now)).collect();

    vouchers::insert_batch(
        &state.db,
        &codes,
        &req.voucher_type,
        req.duration_months,
        &expiry_date,
    )?;

    tracing::info!(admin = %admin.id, count = req.count, "Vouchers generated");
    Ok(Json(json!({
        "success": true,
        "message": format!("Generated {} voucher(s) successfully", req.count),
        "vouchers": codes,
        "expiry_date": expiry_date,
    })))
}
