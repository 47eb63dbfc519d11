//! In-memory fakes for the store, push, analytics and transport seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use nearcast_shared::errors::{AppError, AppResult, ErrorCode};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::geo::BoundingBox;
use crate::live::{ConnectionHandle, ConnectionRegistry};
use crate::models::{
    DeviceToken, NewDeviceToken, NewNotification, Notification, NotificationPreferences,
    PushProvider, UserLocation,
};
use crate::push::{DeliveryReceipt, PushError, PushGateway, PushMessage};
use crate::services::fanout::FanoutCoordinator;
use crate::services::push_dispatcher::{PushDispatcher, PushGateways};
use crate::store::{DeviceTokenStore, LocationStore, NotificationStore, PreferencesStore};

#[derive(Default)]
pub struct MemoryStore {
    notifications: Mutex<Vec<Notification>>,
    tokens: Mutex<Vec<DeviceToken>>,
    locations: Mutex<HashMap<Uuid, UserLocation>>,
    preferences: Mutex<HashMap<Uuid, NotificationPreferences>>,
    failing_recipients: Mutex<HashSet<Uuid>>,
    fail_location_reads: AtomicBool,
    preference_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_location(&self, location: UserLocation) {
        self.locations.lock().unwrap().insert(location.user_id, location);
    }

    pub fn location(&self, user_id: Uuid) -> Option<UserLocation> {
        self.locations.lock().unwrap().get(&user_id).cloned()
    }

    pub fn fail_location_reads(&self, fail: bool) {
        self.fail_location_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notification_writes_for(&self, recipient_id: Uuid) {
        self.failing_recipients.lock().unwrap().insert(recipient_id);
    }

    pub fn notification(&self, id: Uuid) -> Option<Notification> {
        self.notifications.lock().unwrap().iter().find(|n| n.id == id).cloned()
    }

    pub fn notifications_for(&self, recipient_id: Uuid) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_user_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    /// Insert with an explicit creation time, bypassing failure injection.
    pub fn insert_at(&self, new: NewNotification, created_at: DateTime<Utc>) -> Notification {
        let notification = Notification {
            id: Uuid::now_v7(),
            recipient_user_id: new.recipient_user_id,
            source_user_id: new.source_user_id,
            kind: new.kind,
            title: new.title,
            body: new.body,
            metadata: new.metadata,
            is_read: false,
            created_at,
            read_at: None,
        };
        self.notifications.lock().unwrap().push(notification.clone());
        notification
    }

    pub fn add_token(&self, owner_user_id: Uuid, provider: PushProvider) -> DeviceToken {
        let token = DeviceToken {
            id: Uuid::new_v4(),
            owner_user_id,
            token: format!("{provider}-{}", Uuid::new_v4().simple()),
            provider,
            device_kind: None,
            created_at: Utc::now(),
        };
        self.tokens.lock().unwrap().push(token.clone());
        token
    }

    pub fn set_preferences(&self, prefs: NotificationPreferences) {
        self.preferences.lock().unwrap().insert(prefs.user_id, prefs);
    }

    /// Number of preference reads, one per push dispatch.
    pub fn preference_lookups(&self) -> usize {
        self.preference_lookups.load(Ordering::SeqCst)
    }
}

fn not_found() -> AppError {
    AppError::new(ErrorCode::NotificationNotFound, "notification not found")
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, notification: NewNotification) -> AppResult<Notification> {
        if self
            .failing_recipients
            .lock()
            .unwrap()
            .contains(&notification.recipient_user_id)
        {
            return Err(AppError::internal("simulated write failure"));
        }
        Ok(self.insert_at(notification, Utc::now()))
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<Notification> {
        let mut rows = self.notifications.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|n| n.id == notification_id && n.recipient_user_id == recipient_id)
            .ok_or_else(not_found)?;

        if !row.is_read {
            row.is_read = true;
            row.read_at = Some(read_at);
        }
        Ok(row.clone())
    }

    async fn mark_all_read(&self, recipient_id: Uuid, read_at: DateTime<Utc>) -> AppResult<usize> {
        let mut rows = self.notifications.lock().unwrap();
        let mut updated = 0;
        for row in rows
            .iter_mut()
            .filter(|n| n.recipient_user_id == recipient_id && !n.is_read)
        {
            row.is_read = true;
            row.read_at = Some(read_at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn list(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let mut rows: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|n| n.recipient_user_id == recipient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn count_unread(&self, recipient_id: Uuid) -> AppResult<i64> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_user_id == recipient_id && !n.is_read)
            .count() as i64)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut rows = self.notifications.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| n.created_at >= cutoff);
        Ok(before - rows.len())
    }
}

#[async_trait]
impl DeviceTokenStore for MemoryStore {
    async fn list_for_user(&self, owner_user_id: Uuid) -> AppResult<Vec<DeviceToken>> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.owner_user_id == owner_user_id)
            .cloned()
            .collect())
    }

    async fn register(&self, token: NewDeviceToken) -> AppResult<DeviceToken> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|t| t.token != token.token);
        let stored = DeviceToken {
            id: Uuid::new_v4(),
            owner_user_id: token.owner_user_id,
            token: token.token,
            provider: token.provider,
            device_kind: token.device_kind,
            created_at: Utc::now(),
        };
        tokens.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn upsert(&self, location: UserLocation) -> AppResult<UserLocation> {
        self.put_location(location.clone());
        Ok(location)
    }

    async fn updated_since(
        &self,
        cutoff: DateTime<Utc>,
        bounds: Option<BoundingBox>,
    ) -> AppResult<Vec<UserLocation>> {
        if self.fail_location_reads.load(Ordering::SeqCst) {
            return Err(AppError::internal("simulated location read failure"));
        }
        Ok(self
            .locations
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.updated_at >= cutoff)
            .filter(|l| bounds.map_or(true, |b| b.contains(&l.coordinates())))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PreferencesStore for MemoryStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<NotificationPreferences>> {
        self.preference_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.preferences.lock().unwrap().get(&user_id).cloned())
    }
}

/// Push gateway that records every send.
pub struct RecordingGateway {
    provider: PushProvider,
    failing_tokens: Mutex<HashSet<String>>,
    misconfigured: AtomicBool,
    sent: Mutex<Vec<(String, PushMessage)>>,
}

impl RecordingGateway {
    pub fn new(provider: PushProvider) -> Self {
        Self {
            provider,
            failing_tokens: Mutex::new(HashSet::new()),
            misconfigured: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_token(&self, token: &str) {
        self.failing_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn fail_with_configuration(&self) {
        self.misconfigured.store(true, Ordering::SeqCst);
    }

    /// Successful sends only.
    pub fn sent(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    fn provider(&self) -> PushProvider {
        self.provider
    }

    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<DeliveryReceipt, PushError> {
        if self.misconfigured.load(Ordering::SeqCst) {
            return Err(PushError::Configuration("credentials rejected".into()));
        }
        if self.failing_tokens.lock().unwrap().contains(device_token) {
            return Err(PushError::Transient("simulated network error".into()));
        }

        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), message.clone()));
        Ok(DeliveryReceipt {
            message_id: Some(Uuid::new_v4().to_string()),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AnalyticsSink for RecordingSink {
    fn record(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct RecordingHandle {
    id: String,
    fail: AtomicBool,
    emitted: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingHandle {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fail: AtomicBool::new(false),
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_emits(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn emitted(&self) -> Vec<(String, serde_json::Value)> {
        self.emitted.lock().unwrap().clone()
    }
}

impl ConnectionHandle for RecordingHandle {
    fn connection_id(&self) -> String {
        self.id.clone()
    }

    fn emit(&self, event: &str, payload: &serde_json::Value) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("transport closed".into());
        }
        self.emitted
            .lock()
            .unwrap()
            .push((event.to_string(), payload.clone()));
        Ok(())
    }
}

/// Coordinator over a fresh store with no push providers configured.
pub fn coordinator_with_store() -> (Arc<MemoryStore>, FanoutCoordinator) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(PushDispatcher::new(
        store.clone(),
        store.clone(),
        PushGateways::default(),
        Arc::new(RecordingSink::default()),
    ));
    let coordinator = FanoutCoordinator::new(
        store.clone(),
        store.clone(),
        Arc::new(ConnectionRegistry::new()),
        dispatcher,
    );
    (store, coordinator)
}
