use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use nearcast_shared::errors::{AppError, AppResult, ErrorCode};
use nearcast_shared::types::api::ApiResponse;
use nearcast_shared::types::auth::AuthUser;

use crate::geo::Coordinates;
use crate::services::fanout::{ProximityBroadcast, PROXIMITY_RADIUS_M};
use crate::services::nearby::{self, NearbyUser};
use crate::AppState;

pub const MAX_NEARBY_RADIUS_M: f64 = 50_000.0;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[validate(range(min = -90.0, max = 90.0, message = "latitude out of range"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude out of range"))]
    pub longitude: f64,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// PUT /location
/// Store the caller's position and broadcast `user_nearby` to connected neighbours.
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<UpdateLocationRequest>,
) -> AppResult<Json<ApiResponse<ProximityBroadcast>>> {
    req.validate().map_err(super::validation_error)?;

    let broadcast = state
        .coordinator
        .notify_location_update(auth_user.id, req.latitude, req.longitude, req.address)
        .await?;

    Ok(Json(ApiResponse::ok(broadcast)))
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius: Option<f64>,
}

impl NearbyQuery {
    fn radius_m(&self) -> AppResult<f64> {
        let radius = self.radius.unwrap_or(PROXIMITY_RADIUS_M);
        if !(radius.is_finite() && radius > 0.0 && radius <= MAX_NEARBY_RADIUS_M) {
            return Err(AppError::with_details(
                ErrorCode::InvalidRadius,
                format!("radius must be in (0, {MAX_NEARBY_RADIUS_M}] meters"),
                serde_json::json!({ "radius": radius }),
            ));
        }
        Ok(radius)
    }
}

#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub radius_m: f64,
    pub users: Vec<NearbyUser>,
}

/// GET /nearby?lat&lon&radius
pub async fn list_nearby(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<NearbyResponse>>> {
    let center = Coordinates::new(query.lat, query.lon)?;
    let radius_m = query.radius_m()?;

    let users = nearby::find_nearby(state.locations.as_ref(), center, radius_m, auth_user.id).await;

    Ok(Json(ApiResponse::ok(NearbyResponse { radius_m, users })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(radius: Option<f64>) -> NearbyQuery {
        NearbyQuery { lat: 0.0, lon: 0.0, radius }
    }

    #[test]
    fn radius_defaults_to_one_kilometer() {
        assert_eq!(query(None).radius_m().unwrap(), 1_000.0);
    }

    #[test]
    fn radius_bounds() {
        assert!(query(Some(50_000.0)).radius_m().is_ok());
        for bad in [0.0, -1.0, 50_001.0, f64::NAN] {
            let err = query(Some(bad)).radius_m().unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::InvalidRadius));
        }
    }

    #[test]
    fn location_request_validates_range() {
        let req = UpdateLocationRequest {
            latitude: 95.0,
            longitude: 0.0,
            address: None,
        };
        assert!(req.validate().is_err());
    }
}
