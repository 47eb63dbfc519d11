//! Persistence seams.
//!
//! The fan-out core only talks to these traits. `postgres` backs them with
//! diesel; tests use in-memory fakes.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use nearcast_shared::errors::AppResult;

use crate::geo::BoundingBox;
use crate::models::{
    DeviceToken, NewDeviceToken, NewNotification, Notification, NotificationPreferences,
    UserLocation,
};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Append one notification row.
    async fn insert(&self, notification: NewNotification) -> AppResult<Notification>;

    /// Mark a notification read if it belongs to `recipient_id`.
    ///
    /// Fails with `NotificationNotFound` for missing or foreign rows. An
    /// already-read row is returned unchanged.
    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<Notification>;

    async fn mark_all_read(&self, recipient_id: Uuid, read_at: DateTime<Utc>) -> AppResult<usize>;

    /// Newest first, with the recipient's total count.
    async fn list(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)>;

    async fn count_unread(&self, recipient_id: Uuid) -> AppResult<i64>;

    /// Retention sweep. Never called from the fan-out paths.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize>;
}

#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    async fn list_for_user(&self, owner_user_id: Uuid) -> AppResult<Vec<DeviceToken>>;

    /// Insert or re-own a token. Tokens are unique across users.
    async fn register(&self, token: NewDeviceToken) -> AppResult<DeviceToken>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn upsert(&self, location: UserLocation) -> AppResult<UserLocation>;

    /// Rows updated at or after `cutoff`, optionally narrowed to `bounds`.
    async fn updated_since(
        &self,
        cutoff: DateTime<Utc>,
        bounds: Option<BoundingBox>,
    ) -> AppResult<Vec<UserLocation>>;
}

#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<NotificationPreferences>>;
}
