use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use nearcast_shared::errors::AppResult;
use nearcast_shared::types::api::ApiResponse;
use nearcast_shared::types::auth::AuthUser;
use nearcast_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::Notification;
use crate::services::notification_service;
use crate::AppState;

/// GET /notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Notification>>>> {
    let (items, total) = notification_service::list_notifications(
        state.notifications.as_ref(),
        auth_user.id,
        params.limit() as i64,
        params.offset() as i64,
    )
    .await?;

    let paginated = Paginated::new(items, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

#[derive(Debug, serde::Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = notification_service::count_unread(state.notifications.as_ref(), auth_user.id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, serde::Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let updated = state.coordinator.mark_all_read(auth_user.id).await?;
    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

/// POST /notifications/:id/read
///
/// Someone else's notification is reported as not found.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = state.coordinator.mark_notification_read(id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(notification)))
}
