//! Event fan-out: recipient resolution, notification writes, live emit and push.
//!
//! Every recipient is handled independently. A failure for one recipient is
//! logged and never stops the others or fails the originating action.
//! Clients receive the same notification over the live connection and over
//! push, and must dedupe by notification id.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nearcast_shared::errors::{AppError, AppResult, ErrorCode};

use crate::geo::Coordinates;
use crate::live::ConnectionRegistry;
use crate::models::{NewNotification, Notification, NotificationKind, UserLocation};
use crate::push::{Priority, PushMessage};
use crate::services::nearby::{self, NearbyUser};
use crate::services::notification_service;
use crate::services::push_dispatcher::{DispatchOutcome, PushDispatcher};
use crate::store::{LocationStore, NotificationStore};

pub const PROXIMITY_RADIUS_M: f64 = 1_000.0;
pub const DEFAULT_SAFETY_ALERT_RADIUS_M: f64 = 1_000.0;
/// Emergencies ignore any caller-supplied radius.
pub const EMERGENCY_RADIUS_M: f64 = 5_000.0;
pub const PREVIEW_MAX_CHARS: usize = 100;

const USER_NEARBY_EVENT: &str = "user_nearby";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAlert {
    #[serde(default)]
    pub alert_id: Option<Uuid>,
    pub alert_type: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Per-kind notification metadata, stored as the row's `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    Like {
        post_id: Uuid,
    },
    Comment {
        post_id: Uuid,
        preview: String,
    },
    FriendRequest {
        request_id: Uuid,
    },
    #[serde(rename = "dm")]
    DirectMessage {
        message_id: Uuid,
        preview: String,
    },
    SafetyAlert {
        alert: SafetyAlert,
        location: Coordinates,
        radius_m: f64,
        distance_m: f64,
    },
    Emergency {
        message: String,
        location: Coordinates,
        distance_m: f64,
    },
    Mention {
        post_id: Uuid,
        excerpt: String,
    },
}

impl NotificationPayload {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Like { .. } => NotificationKind::Like,
            Self::Comment { .. } => NotificationKind::Comment,
            Self::FriendRequest { .. } => NotificationKind::FriendRequest,
            Self::DirectMessage { .. } => NotificationKind::DirectMessage,
            Self::SafetyAlert { .. } => NotificationKind::SafetyAlert,
            Self::Emergency { .. } => NotificationKind::Emergency,
            Self::Mention { .. } => NotificationKind::Mention,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::Like { .. } => "New like".into(),
            Self::Comment { .. } => "New comment".into(),
            Self::FriendRequest { .. } => "New friend request".into(),
            Self::DirectMessage { .. } => "New message".into(),
            Self::SafetyAlert { alert, .. } => format!("Safety alert: {}", alert.alert_type),
            Self::Emergency { .. } => "Emergency nearby".into(),
            Self::Mention { .. } => "You were mentioned".into(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::Like { .. } => "Someone liked your post".into(),
            Self::Comment { preview, .. } => preview.clone(),
            Self::FriendRequest { .. } => "Someone wants to connect with you".into(),
            Self::DirectMessage { preview, .. } => preview.clone(),
            Self::SafetyAlert { alert, distance_m, .. } => {
                if alert.description.is_empty() {
                    format!("Reported {:.0} m from you", distance_m)
                } else {
                    alert.description.clone()
                }
            }
            Self::Emergency { message, distance_m, .. } => {
                format!("{} ({:.0} m away)", message, distance_m)
            }
            Self::Mention { excerpt, .. } => excerpt.clone(),
        }
    }

    /// Socket event name used for the live emit.
    pub fn live_event(&self) -> &'static str {
        match self {
            Self::Like { .. } => "new_like",
            Self::Comment { .. } => "new_comment",
            Self::FriendRequest { .. } => "friend_request",
            Self::DirectMessage { .. } => "new_message",
            Self::SafetyAlert { .. } => "safety_alert",
            Self::Emergency { .. } => "emergency_alert",
            Self::Mention { .. } => "mention",
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Self::SafetyAlert { .. } | Self::Emergency { .. } | Self::DirectMessage { .. } => Priority::High,
            _ => Priority::Normal,
        }
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Counts for one fan-out. Returned to callers for logging; never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutSummary {
    pub recipients: usize,
    pub notifications_created: usize,
    pub live_delivered: usize,
    pub push_sent: usize,
    pub push_failed: usize,
    pub push_deferred: usize,
    pub configuration_errors: usize,
}

impl FanoutSummary {
    fn absorb(&mut self, other: FanoutSummary) {
        self.recipients += other.recipients;
        self.notifications_created += other.notifications_created;
        self.live_delivered += other.live_delivered;
        self.push_sent += other.push_sent;
        self.push_failed += other.push_failed;
        self.push_deferred += other.push_deferred;
        self.configuration_errors += other.configuration_errors;
    }
}

/// Result of a location update: who is nearby and what was broadcast to them.
#[derive(Debug, Clone, Serialize)]
pub struct ProximityBroadcast {
    pub nearby: Vec<NearbyUser>,
    pub summary: FanoutSummary,
}

pub struct FanoutCoordinator {
    notifications: Arc<dyn NotificationStore>,
    locations: Arc<dyn LocationStore>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<PushDispatcher>,
}

impl FanoutCoordinator {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        locations: Arc<dyn LocationStore>,
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<PushDispatcher>,
    ) -> Self {
        Self {
            notifications,
            locations,
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub async fn notify_like(&self, actor_id: Uuid, post_owner_id: Uuid, post_id: Uuid) -> FanoutSummary {
        self.notify_one(actor_id, post_owner_id, NotificationPayload::Like { post_id })
            .await
    }

    pub async fn notify_comment(
        &self,
        actor_id: Uuid,
        post_owner_id: Uuid,
        post_id: Uuid,
        comment_text: &str,
    ) -> FanoutSummary {
        let payload = NotificationPayload::Comment {
            post_id,
            preview: preview(comment_text),
        };
        self.notify_one(actor_id, post_owner_id, payload).await
    }

    pub async fn notify_friend_request(&self, actor_id: Uuid, receiver_id: Uuid, request_id: Uuid) -> FanoutSummary {
        self.notify_one(actor_id, receiver_id, NotificationPayload::FriendRequest { request_id })
            .await
    }

    pub async fn notify_direct_message(
        &self,
        actor_id: Uuid,
        receiver_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> FanoutSummary {
        let payload = NotificationPayload::DirectMessage {
            message_id,
            preview: preview(content),
        };
        self.notify_one(actor_id, receiver_id, payload).await
    }

    pub async fn notify_mention(
        &self,
        actor_id: Uuid,
        mentioned_user_id: Uuid,
        post_id: Uuid,
        excerpt: &str,
    ) -> FanoutSummary {
        let payload = NotificationPayload::Mention {
            post_id,
            excerpt: preview(excerpt),
        };
        self.notify_one(actor_id, mentioned_user_id, payload).await
    }

    /// Record the actor's position and tell nearby connected users about it.
    ///
    /// Live only: `user_nearby` has no notification row and no push.
    pub async fn notify_location_update(
        &self,
        actor_id: Uuid,
        latitude: f64,
        longitude: f64,
        address: Option<String>,
    ) -> AppResult<ProximityBroadcast> {
        let position = Coordinates::new(latitude, longitude)?;

        let location = UserLocation {
            user_id: actor_id,
            latitude,
            longitude,
            address,
            updated_at: chrono::Utc::now(),
        };
        if let Err(e) = self.locations.upsert(location).await {
            tracing::error!(error = %e, user_id = %actor_id, "failed to store location");
        }
        self.registry.update_location(actor_id, position);

        let nearby = nearby::find_nearby(self.locations.as_ref(), position, PROXIMITY_RADIUS_M, actor_id).await;

        let mut summary = FanoutSummary {
            recipients: nearby.len(),
            ..Default::default()
        };
        for user in &nearby {
            let payload = serde_json::json!({
                "user_id": actor_id,
                "distance_m": user.distance_m.round(),
            });
            if self.registry.emit_to(user.user_id, USER_NEARBY_EVENT, &payload) {
                summary.live_delivered += 1;
            }
        }

        counter!("fanout_recipients_total", "event" => USER_NEARBY_EVENT).increment(nearby.len() as u64);
        tracing::debug!(user_id = %actor_id, nearby = nearby.len(), live = summary.live_delivered, "location broadcast");

        Ok(ProximityBroadcast { nearby, summary })
    }

    /// Notify every fresh user within `radius_m` (default 1 km) of the alert.
    pub async fn notify_safety_alert(
        &self,
        actor_id: Uuid,
        latitude: f64,
        longitude: f64,
        radius_m: Option<f64>,
        alert: SafetyAlert,
    ) -> AppResult<FanoutSummary> {
        let center = Coordinates::new(latitude, longitude)?;
        let radius_m = radius_m.unwrap_or(DEFAULT_SAFETY_ALERT_RADIUS_M);
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(AppError::with_details(
                ErrorCode::InvalidRadius,
                "affected area must be a positive number of meters",
                serde_json::json!({ "affected_area": radius_m }),
            ));
        }

        let nearby = nearby::find_nearby(self.locations.as_ref(), center, radius_m, actor_id).await;
        let recipients = nearby
            .into_iter()
            .map(|user| {
                let payload = NotificationPayload::SafetyAlert {
                    alert: alert.clone(),
                    location: center,
                    radius_m,
                    distance_m: user.distance_m,
                };
                (user.user_id, payload)
            })
            .collect();

        let summary = self.fan_out(actor_id, recipients).await;
        tracing::info!(
            user_id = %actor_id,
            radius_m,
            recipients = summary.recipients,
            created = summary.notifications_created,
            "safety alert fanned out"
        );
        Ok(summary)
    }

    /// Notify every fresh user within 5 km. The radius is not negotiable.
    pub async fn notify_emergency(
        &self,
        actor_id: Uuid,
        latitude: f64,
        longitude: f64,
        message: &str,
    ) -> AppResult<FanoutSummary> {
        let center = Coordinates::new(latitude, longitude)?;
        let message = preview(message);

        let nearby = nearby::find_nearby(self.locations.as_ref(), center, EMERGENCY_RADIUS_M, actor_id).await;
        let recipients = nearby
            .into_iter()
            .map(|user| {
                let payload = NotificationPayload::Emergency {
                    message: message.clone(),
                    location: center,
                    distance_m: user.distance_m,
                };
                (user.user_id, payload)
            })
            .collect();

        let summary = self.fan_out(actor_id, recipients).await;
        tracing::warn!(
            user_id = %actor_id,
            recipients = summary.recipients,
            created = summary.notifications_created,
            "emergency fanned out"
        );
        Ok(summary)
    }

    pub async fn mark_notification_read(&self, notification_id: Uuid, recipient_id: Uuid) -> AppResult<Notification> {
        notification_service::mark_read(self.notifications.as_ref(), notification_id, recipient_id).await
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> AppResult<usize> {
        notification_service::mark_all_read(self.notifications.as_ref(), recipient_id).await
    }

    async fn notify_one(&self, actor_id: Uuid, recipient_id: Uuid, payload: NotificationPayload) -> FanoutSummary {
        if actor_id == recipient_id {
            tracing::debug!(user_id = %actor_id, kind = %payload.kind(), "skipping self notification");
            return FanoutSummary::default();
        }
        self.fan_out(actor_id, vec![(recipient_id, payload)]).await
    }

    async fn fan_out(&self, actor_id: Uuid, recipients: Vec<(Uuid, NotificationPayload)>) -> FanoutSummary {
        let Some(kind) = recipients.first().map(|(_, p)| p.kind()) else {
            return FanoutSummary::default();
        };
        counter!("fanout_recipients_total", "event" => kind.as_str()).increment(recipients.len() as u64);

        let deliveries = recipients
            .into_iter()
            .filter(|(recipient_id, _)| *recipient_id != actor_id)
            .map(|(recipient_id, payload)| self.deliver(actor_id, recipient_id, payload));

        let mut summary = FanoutSummary::default();
        for report in join_all(deliveries).await {
            summary.absorb(report);
        }
        summary
    }

    /// Write, emit and push for one recipient.
    async fn deliver(&self, actor_id: Uuid, recipient_id: Uuid, payload: NotificationPayload) -> FanoutSummary {
        let mut report = FanoutSummary {
            recipients: 1,
            ..Default::default()
        };

        let new = NewNotification {
            recipient_user_id: recipient_id,
            source_user_id: Some(actor_id),
            kind: payload.kind(),
            title: payload.title(),
            body: payload.body(),
            metadata: payload.metadata(),
        };

        let notification = match notification_service::create_notification(self.notifications.as_ref(), new).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, user_id = %recipient_id, kind = %payload.kind(), "notification write failed");
                return report;
            }
        };
        report.notifications_created = 1;

        match serde_json::to_value(&notification) {
            Ok(live) => {
                if self.registry.emit_to(recipient_id, payload.live_event(), &live) {
                    report.live_delivered = 1;
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode live payload"),
        }

        let mut data = BTreeMap::new();
        data.insert("notification_id".to_string(), notification.id.to_string());
        data.insert("kind".to_string(), notification.kind.as_str().to_string());
        data.insert("source_user_id".to_string(), actor_id.to_string());

        let message = PushMessage {
            title: notification.title.clone(),
            body: notification.body.clone(),
            data,
            priority: payload.priority(),
        };

        match self.dispatcher.dispatch(recipient_id, message).await {
            Ok(DispatchOutcome::Deferred) => report.push_deferred = 1,
            Ok(DispatchOutcome::Delivered(s)) => {
                report.push_sent = s.successful;
                report.push_failed = s.failed;
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = %recipient_id, "push dispatch misconfigured");
                report.configuration_errors = 1;
            }
        }

        report
    }
}

fn preview(text: &str) -> String {
    text.trim().chars().take(PREVIEW_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PushProvider;
    use crate::push::PushGateway;
    use crate::services::push_dispatcher::PushGateways;
    use crate::testing::{MemoryStore, RecordingGateway, RecordingHandle, RecordingSink};
    use chrono::{Duration, Utc};

    const KM_LAT: f64 = 0.009;
    const LAT: f64 = 40.7128;
    const LON: f64 = -74.006;

    struct Harness {
        store: Arc<MemoryStore>,
        fcm: Arc<RecordingGateway>,
        registry: Arc<ConnectionRegistry>,
        coordinator: FanoutCoordinator,
    }

    fn harness_with(fcm_configured: bool) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let fcm = Arc::new(RecordingGateway::new(PushProvider::Fcm));
        let registry = Arc::new(ConnectionRegistry::new());
        let gateways = PushGateways {
            fcm: fcm_configured.then(|| fcm.clone() as Arc<dyn PushGateway>),
            apns: None,
        };
        let dispatcher = Arc::new(PushDispatcher::new(
            store.clone(),
            store.clone(),
            gateways,
            Arc::new(RecordingSink::default()),
        ));
        let coordinator = FanoutCoordinator::new(store.clone(), store.clone(), registry.clone(), dispatcher);
        Harness {
            store,
            fcm,
            registry,
            coordinator,
        }
    }

    fn harness() -> Harness {
        harness_with(true)
    }

    fn place(store: &MemoryStore, lat_km: f64, age_secs: i64) -> Uuid {
        let user_id = Uuid::new_v4();
        store.put_location(UserLocation {
            user_id,
            latitude: LAT + lat_km * KM_LAT,
            longitude: LON,
            address: None,
            updated_at: Utc::now() - Duration::seconds(age_secs),
        });
        user_id
    }

    fn alert() -> SafetyAlert {
        SafetyAlert {
            alert_id: Some(Uuid::new_v4()),
            alert_type: "fire".into(),
            severity: Some("high".into()),
            description: "Smoke on Main St".into(),
        }
    }

    #[tokio::test]
    async fn self_like_writes_and_dispatches_nothing() {
        let h = harness();
        let actor = Uuid::new_v4();
        h.store.add_token(actor, PushProvider::Fcm);

        let summary = h.coordinator.notify_like(actor, actor, Uuid::new_v4()).await;

        assert_eq!(summary, FanoutSummary::default());
        assert_eq!(h.store.notification_count(), 0);
        assert_eq!(h.store.preference_lookups(), 0);
        assert!(h.fcm.sent().is_empty());
    }

    #[tokio::test]
    async fn like_is_written_emitted_and_pushed() {
        let h = harness();
        let (actor, owner) = (Uuid::new_v4(), Uuid::new_v4());
        h.store.add_token(owner, PushProvider::Fcm);
        let handle = Arc::new(RecordingHandle::new("conn-owner"));
        h.registry.register(owner, handle.clone());

        let summary = h.coordinator.notify_like(actor, owner, Uuid::new_v4()).await;

        assert_eq!(summary.notifications_created, 1);
        assert_eq!(summary.live_delivered, 1);
        assert_eq!(summary.push_sent, 1);

        let emitted = handle.emitted();
        assert_eq!(emitted[0].0, "new_like");
        let notification_id = emitted[0].1["id"].as_str().unwrap().to_string();
        let (_, pushed) = &h.fcm.sent()[0];
        assert_eq!(pushed.data["notification_id"], notification_id);
    }

    #[tokio::test]
    async fn safety_alert_notifies_each_nearby_user_once() {
        let h = harness();
        let actor = place(&h.store, 0.0, 5);
        let near = place(&h.store, 0.5, 10);
        let edge = place(&h.store, 1.8, 10);
        let _far = place(&h.store, 3.0, 10);
        let _stale = place(&h.store, 0.2, 600);

        let center = Coordinates::new(LAT, LON).unwrap();
        let expected = nearby::find_nearby(h.store.as_ref(), center, 2_000.0, actor).await;
        let expected_ids: Vec<Uuid> = expected.iter().map(|n| n.user_id).collect();
        assert_eq!(expected_ids, vec![near, edge]);

        let summary = h
            .coordinator
            .notify_safety_alert(actor, LAT, LON, Some(2_000.0), alert())
            .await
            .unwrap();

        assert_eq!(summary.recipients, 2);
        assert_eq!(summary.notifications_created, 2);
        assert_eq!(h.store.preference_lookups(), 2);
        for user in expected_ids {
            let rows = h.store.notifications_for(user);
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].kind, NotificationKind::SafetyAlert);
        }
        assert!(h.store.notifications_for(actor).is_empty());
    }

    #[tokio::test]
    async fn safety_alert_rejects_bad_input_before_side_effects() {
        let h = harness();
        place(&h.store, 0.1, 5);

        let err = h
            .coordinator
            .notify_safety_alert(Uuid::new_v4(), LAT, LON, Some(0.0), alert())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidRadius));

        let err = h
            .coordinator
            .notify_safety_alert(Uuid::new_v4(), 91.0, LON, None, alert())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidCoordinates));
        assert_eq!(h.store.notification_count(), 0);
    }

    #[tokio::test]
    async fn emergency_always_uses_five_kilometers() {
        let h = harness();
        let actor = Uuid::new_v4();
        let inside = place(&h.store, 4.0, 10);
        let outside = place(&h.store, 6.0, 10);

        let summary = h.coordinator.notify_emergency(actor, LAT, LON, "Need help").await.unwrap();

        assert_eq!(summary.notifications_created, 1);
        assert_eq!(h.store.notifications_for(inside).len(), 1);
        assert!(h.store.notifications_for(outside).is_empty());
        assert_eq!(h.store.notifications_for(inside)[0].kind, NotificationKind::Emergency);
    }

    #[tokio::test]
    async fn write_failure_for_one_recipient_does_not_stop_others() {
        let h = harness();
        let actor = Uuid::new_v4();
        let broken = place(&h.store, 0.2, 10);
        let healthy = place(&h.store, 0.4, 10);
        h.store.fail_notification_writes_for(broken);

        let summary = h
            .coordinator
            .notify_safety_alert(actor, LAT, LON, None, alert())
            .await
            .unwrap();

        assert_eq!(summary.recipients, 2);
        assert_eq!(summary.notifications_created, 1);
        assert_eq!(h.store.notifications_for(healthy).len(), 1);
        // No notification id, so nothing to push for the failed write.
        assert_eq!(h.store.preference_lookups(), 1);
    }

    #[tokio::test]
    async fn location_update_is_live_only() {
        let h = harness();
        let actor = Uuid::new_v4();
        let neighbour = place(&h.store, 0.3, 10);
        let handle = Arc::new(RecordingHandle::new("conn-n"));
        h.registry.register(neighbour, handle.clone());

        let broadcast = h
            .coordinator
            .notify_location_update(actor, LAT, LON, Some("Broadway".into()))
            .await
            .unwrap();

        assert_eq!(broadcast.nearby.len(), 1);
        assert_eq!(broadcast.summary.live_delivered, 1);
        assert_eq!(h.store.notification_count(), 0);
        assert!(h.fcm.sent().is_empty());

        let (event, payload) = &handle.emitted()[0];
        assert_eq!(event, "user_nearby");
        assert_eq!(payload["user_id"], actor.to_string());
        assert!(payload.get("latitude").is_none());
        assert!(h.store.location(actor).is_some());
    }

    #[tokio::test]
    async fn misconfigured_push_still_writes_notification() {
        let h = harness_with(false);
        let (actor, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        h.store.add_token(receiver, PushProvider::Fcm);

        let summary = h
            .coordinator
            .notify_direct_message(actor, receiver, Uuid::new_v4(), "hello")
            .await;

        assert_eq!(summary.notifications_created, 1);
        assert_eq!(summary.configuration_errors, 1);
    }

    #[tokio::test]
    async fn previews_are_truncated() {
        let h = harness();
        let (actor, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        let long = "x".repeat(250);

        h.coordinator.notify_direct_message(actor, receiver, Uuid::new_v4(), &long).await;

        let rows = h.store.notifications_for(receiver);
        assert_eq!(rows[0].body.chars().count(), PREVIEW_MAX_CHARS);
        assert_eq!(rows[0].kind, NotificationKind::DirectMessage);
        assert_eq!(rows[0].metadata["kind"], "dm");
    }

    #[tokio::test]
    async fn mark_read_via_coordinator_checks_owner() {
        let h = harness();
        let (actor, owner) = (Uuid::new_v4(), Uuid::new_v4());
        h.coordinator.notify_friend_request(actor, owner, Uuid::new_v4()).await;
        let id = h.store.notifications_for(owner)[0].id;

        let err = h.coordinator.mark_notification_read(id, actor).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotificationNotFound));

        assert!(h.coordinator.mark_notification_read(id, owner).await.unwrap().is_read);
        assert_eq!(h.coordinator.mark_all_read(owner).await.unwrap(), 0);
    }
}
