use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use nearcast_shared::errors::{AppError, AppResult, ErrorCode};
use nearcast_shared::types::api::ApiResponse;
use nearcast_shared::types::auth::AuthUser;

use crate::models::{DeviceKind, DeviceToken, NewDeviceToken, PushProvider};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceRequest {
    #[validate(length(min = 1, max = 4096, message = "token must be 1-4096 characters"))]
    pub token: String,
    pub provider: PushProvider,
    pub device_kind: Option<DeviceKind>,
}

/// Tokens end up in provider URLs, so only path-safe characters pass.
/// APNs tokens are hex; FCM registration tokens add `-`, `_` and `:`.
fn is_well_formed_token(provider: PushProvider, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    match provider {
        PushProvider::Apns => token.chars().all(|c| c.is_ascii_hexdigit()),
        PushProvider::Fcm => token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')),
    }
}

/// POST /devices
/// Register (or re-own) a push token for the authenticated user.
pub async fn register_device(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<RegisterDeviceRequest>,
) -> AppResult<Json<ApiResponse<DeviceToken>>> {
    req.validate().map_err(super::validation_error)?;

    let token = req.token.trim();
    if !is_well_formed_token(req.provider, token) {
        return Err(AppError::new(ErrorCode::DeviceTokenInvalid, "device token is malformed"));
    }

    if !state.dispatcher.gateways().is_configured(req.provider) {
        tracing::warn!(provider = %req.provider, user_id = %auth_user.id, "registering token for unconfigured provider");
    }

    let device = state
        .devices
        .register(NewDeviceToken {
            owner_user_id: auth_user.id,
            token: token.to_string(),
            provider: req.provider,
            device_kind: req.device_kind,
        })
        .await?;

    tracing::info!(user_id = %auth_user.id, provider = %device.provider, "device token registered");
    Ok(Json(ApiResponse::ok(device)))
}
