use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use nearcast_shared::errors::AppResult;
use nearcast_shared::types::api::ApiResponse;
use nearcast_shared::types::auth::AuthUser;

use crate::services::fanout::{FanoutSummary, SafetyAlert};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SafetyAlertRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Meters. Defaults to 1 km.
    pub affected_area: Option<f64>,
    pub alert_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub alert_type: String,
    pub severity: Option<String>,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: String,
}

/// POST /alerts/safety
pub async fn create_safety_alert(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<SafetyAlertRequest>,
) -> AppResult<Json<ApiResponse<FanoutSummary>>> {
    req.validate().map_err(super::validation_error)?;

    let alert = SafetyAlert {
        alert_id: req.alert_id,
        alert_type: req.alert_type,
        severity: req.severity,
        description: req.description,
    };

    let summary = state
        .coordinator
        .notify_safety_alert(auth_user.id, req.latitude, req.longitude, req.affected_area, alert)
        .await?;

    Ok(Json(ApiResponse::ok(summary)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmergencyRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub message: String,
}

/// POST /alerts/emergency
/// Always broadcast within 5 km; any radius in the request is ignored.
pub async fn create_emergency(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<EmergencyRequest>,
) -> AppResult<Json<ApiResponse<FanoutSummary>>> {
    req.validate().map_err(super::validation_error)?;

    let summary = state
        .coordinator
        .notify_emergency(auth_user.id, req.latitude, req.longitude, &req.message)
        .await?;

    Ok(Json(ApiResponse::ok(summary)))
}
