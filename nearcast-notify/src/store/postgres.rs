use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use nearcast_shared::clients::db::{checkout, DbPool};
use nearcast_shared::errors::{AppError, AppResult, ErrorCode};

use super::{DeviceTokenStore, LocationStore, NotificationStore, PreferencesStore};
use crate::geo::BoundingBox;
use crate::models::{
    DeviceToken, NewDeviceToken, NewNotification, Notification, NotificationPreferences,
    QuietHours, UserLocation,
};
use crate::schema::{device_tokens, notification_preferences, notifications, user_locations};

/// Diesel-backed implementation of every store trait.
///
/// Queries are synchronous, so each call runs on the blocking pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = checkout(&pool)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("blocking db task failed: {e}")))?
    }
}

#[derive(Debug, Queryable)]
struct NotificationRow {
    id: Uuid,
    recipient_user_id: Uuid,
    source_user_id: Option<Uuid>,
    kind: String,
    title: String,
    body: String,
    metadata: serde_json::Value,
    is_read: bool,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse().map_err(|e: String| {
            tracing::error!(notification_id = %row.id, error = %e, "corrupt notification row");
            AppError::internal("corrupt notification row")
        })?;

        Ok(Notification {
            id: row.id,
            recipient_user_id: row.recipient_user_id,
            source_user_id: row.source_user_id,
            kind,
            title: row.title,
            body: row.body,
            metadata: row.metadata,
            is_read: row.is_read,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
struct NewNotificationRow {
    recipient_user_id: Uuid,
    source_user_id: Option<Uuid>,
    kind: String,
    title: String,
    body: String,
    metadata: serde_json::Value,
}

fn notification_not_found() -> AppError {
    AppError::new(ErrorCode::NotificationNotFound, "notification not found")
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert(&self, notification: NewNotification) -> AppResult<Notification> {
        let row = NewNotificationRow {
            recipient_user_id: notification.recipient_user_id,
            source_user_id: notification.source_user_id,
            kind: notification.kind.as_str().to_string(),
            title: notification.title,
            body: notification.body,
            metadata: notification.metadata,
        };

        self.run(move |conn| {
            let inserted = diesel::insert_into(notifications::table)
                .values(&row)
                .get_result::<NotificationRow>(conn)?;
            Notification::try_from(inserted)
        })
        .await
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<Notification> {
        self.run(move |conn| {
            let updated = diesel::update(
                notifications::table
                    .filter(notifications::id.eq(notification_id))
                    .filter(notifications::recipient_user_id.eq(recipient_id))
                    .filter(notifications::is_read.eq(false)),
            )
            .set((
                notifications::is_read.eq(true),
                notifications::read_at.eq(Some(read_at)),
            ))
            .get_result::<NotificationRow>(conn)
            .optional()?;

            let row = match updated {
                Some(row) => row,
                None => notifications::table
                    .filter(notifications::id.eq(notification_id))
                    .filter(notifications::recipient_user_id.eq(recipient_id))
                    .first::<NotificationRow>(conn)
                    .optional()?
                    .ok_or_else(notification_not_found)?,
            };

            Notification::try_from(row)
        })
        .await
    }

    async fn mark_all_read(&self, recipient_id: Uuid, read_at: DateTime<Utc>) -> AppResult<usize> {
        self.run(move |conn| {
            let updated = diesel::update(
                notifications::table
                    .filter(notifications::recipient_user_id.eq(recipient_id))
                    .filter(notifications::is_read.eq(false)),
            )
            .set((
                notifications::is_read.eq(true),
                notifications::read_at.eq(Some(read_at)),
            ))
            .execute(conn)?;
            Ok(updated)
        })
        .await
    }

    async fn list(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        self.run(move |conn| {
            let total: i64 = notifications::table
                .filter(notifications::recipient_user_id.eq(recipient_id))
                .count()
                .get_result(conn)?;

            let rows = notifications::table
                .filter(notifications::recipient_user_id.eq(recipient_id))
                .order(notifications::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load::<NotificationRow>(conn)?;

            let items = rows
                .into_iter()
                .map(Notification::try_from)
                .collect::<AppResult<Vec<_>>>()?;
            Ok((items, total))
        })
        .await
    }

    async fn count_unread(&self, recipient_id: Uuid) -> AppResult<i64> {
        self.run(move |conn| {
            let count: i64 = notifications::table
                .filter(notifications::recipient_user_id.eq(recipient_id))
                .filter(notifications::is_read.eq(false))
                .count()
                .get_result(conn)?;
            Ok(count)
        })
        .await
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        self.run(move |conn| {
            let deleted = diesel::delete(
                notifications::table.filter(notifications::created_at.lt(cutoff)),
            )
            .execute(conn)?;
            Ok(deleted)
        })
        .await
    }
}

#[derive(Debug, Queryable)]
struct DeviceTokenRow {
    id: Uuid,
    owner_user_id: Uuid,
    token: String,
    provider: String,
    device_kind: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeviceTokenRow> for DeviceToken {
    type Error = AppError;

    fn try_from(row: DeviceTokenRow) -> Result<Self, Self::Error> {
        let provider = row.provider.parse().map_err(|e: String| {
            tracing::error!(token_id = %row.id, error = %e, "corrupt device token row");
            AppError::internal("corrupt device token row")
        })?;
        // An unknown device kind is informational only.
        let device_kind = row.device_kind.as_deref().and_then(|k| k.parse().ok());

        Ok(DeviceToken {
            id: row.id,
            owner_user_id: row.owner_user_id,
            token: row.token,
            provider,
            device_kind,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = device_tokens)]
struct NewDeviceTokenRow {
    owner_user_id: Uuid,
    token: String,
    provider: String,
    device_kind: Option<String>,
}

#[async_trait]
impl DeviceTokenStore for PgStore {
    async fn list_for_user(&self, owner_user_id: Uuid) -> AppResult<Vec<DeviceToken>> {
        self.run(move |conn| {
            device_tokens::table
                .filter(device_tokens::owner_user_id.eq(owner_user_id))
                .order(device_tokens::created_at.asc())
                .load::<DeviceTokenRow>(conn)?
                .into_iter()
                .map(DeviceToken::try_from)
                .collect()
        })
        .await
    }

    async fn register(&self, token: NewDeviceToken) -> AppResult<DeviceToken> {
        let row = NewDeviceTokenRow {
            owner_user_id: token.owner_user_id,
            token: token.token,
            provider: token.provider.as_str().to_string(),
            device_kind: token.device_kind.map(|k| k.as_str().to_string()),
        };

        self.run(move |conn| {
            let saved = diesel::insert_into(device_tokens::table)
                .values(&row)
                .on_conflict(device_tokens::token)
                .do_update()
                .set((
                    device_tokens::owner_user_id.eq(row.owner_user_id),
                    device_tokens::provider.eq(&row.provider),
                    device_tokens::device_kind.eq(&row.device_kind),
                ))
                .get_result::<DeviceTokenRow>(conn)?;
            DeviceToken::try_from(saved)
        })
        .await
    }
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = user_locations, treat_none_as_null = true)]
struct UserLocationRow {
    user_id: Uuid,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<UserLocationRow> for UserLocation {
    fn from(row: UserLocationRow) -> Self {
        Self {
            user_id: row.user_id,
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl LocationStore for PgStore {
    async fn upsert(&self, location: UserLocation) -> AppResult<UserLocation> {
        let row = UserLocationRow {
            user_id: location.user_id,
            latitude: location.latitude,
            longitude: location.longitude,
            address: location.address,
            updated_at: location.updated_at,
        };

        self.run(move |conn| {
            let saved = diesel::insert_into(user_locations::table)
                .values(&row)
                .on_conflict(user_locations::user_id)
                .do_update()
                .set(&row)
                .get_result::<UserLocationRow>(conn)?;
            Ok(saved.into())
        })
        .await
    }

    async fn updated_since(
        &self,
        cutoff: DateTime<Utc>,
        bounds: Option<BoundingBox>,
    ) -> AppResult<Vec<UserLocation>> {
        self.run(move |conn| {
            let mut query = user_locations::table
                .filter(user_locations::updated_at.ge(cutoff))
                .into_boxed();

            if let Some(b) = bounds {
                query = query
                    .filter(user_locations::latitude.between(b.min_lat, b.max_lat))
                    .filter(user_locations::longitude.between(b.min_lon, b.max_lon));
            }

            let rows = query.load::<UserLocationRow>(conn)?;
            Ok(rows.into_iter().map(UserLocation::from).collect())
        })
        .await
    }
}

#[derive(Debug, Queryable)]
struct PreferencesRow {
    user_id: Uuid,
    quiet_start: Option<String>,
    quiet_end: Option<String>,
    quiet_timezone: Option<String>,
}

impl From<PreferencesRow> for NotificationPreferences {
    fn from(row: PreferencesRow) -> Self {
        let quiet_hours = match (row.quiet_start, row.quiet_end) {
            (Some(start), Some(end)) => Some(QuietHours {
                start,
                end,
                timezone: row.quiet_timezone,
            }),
            _ => None,
        };

        Self {
            user_id: row.user_id,
            quiet_hours,
        }
    }
}

#[async_trait]
impl PreferencesStore for PgStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<NotificationPreferences>> {
        self.run(move |conn| {
            let row = notification_preferences::table
                .filter(notification_preferences::user_id.eq(user_id))
                .first::<PreferencesRow>(conn)
                .optional()?;
            Ok(row.map(NotificationPreferences::from))
        })
        .await
    }
}
