use chrono::Utc;
use metrics::counter;
use uuid::Uuid;

use nearcast_shared::errors::AppResult;

use crate::models::{NewNotification, Notification};
use crate::store::NotificationStore;

/// Append a notification row. Never updates or deletes.
pub async fn create_notification(
    store: &dyn NotificationStore,
    notification: NewNotification,
) -> AppResult<Notification> {
    let kind = notification.kind;
    let recipient_id = notification.recipient_user_id;

    let created = store.insert(notification).await?;
    counter!("notifications_created_total", "kind" => kind.as_str()).increment(1);

    tracing::debug!(
        notification_id = %created.id,
        user_id = %recipient_id,
        kind = %kind,
        "notification created"
    );

    Ok(created)
}

/// List notifications for a user with pagination.
pub async fn list_notifications(
    store: &dyn NotificationStore,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<Notification>, i64)> {
    store.list(user_id, limit, offset).await
}

/// Count unread notifications for a user.
pub async fn count_unread(store: &dyn NotificationStore, user_id: Uuid) -> AppResult<i64> {
    store.count_unread(user_id).await
}

/// Mark a single notification as read (only if it belongs to the user).
pub async fn mark_read(
    store: &dyn NotificationStore,
    notification_id: Uuid,
    user_id: Uuid,
) -> AppResult<Notification> {
    let notification = store.mark_read(notification_id, user_id, Utc::now()).await?;
    tracing::debug!(notification_id = %notification_id, user_id = %user_id, "notification marked read");
    Ok(notification)
}

/// Mark all unread notifications as read for a user.
pub async fn mark_all_read(store: &dyn NotificationStore, user_id: Uuid) -> AppResult<usize> {
    let updated = store.mark_all_read(user_id, Utc::now()).await?;
    tracing::debug!(user_id = %user_id, updated, "notifications marked read");
    Ok(updated)
}
