use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `nearcast.{domain}.{entity}.{action}`
/// Example: `nearcast.social.post.liked`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Social events
    pub const SOCIAL_POST_LIKED: &str = "nearcast.social.post.liked";
    pub const SOCIAL_POST_COMMENTED: &str = "nearcast.social.post.commented";
    pub const SOCIAL_POST_MENTIONED: &str = "nearcast.social.post.mentioned";
    pub const SOCIAL_FRIEND_REQUESTED: &str = "nearcast.social.friend.requested";

    // Messaging events
    pub const MESSAGING_MESSAGE_SENT: &str = "nearcast.messaging.message.sent";

    // Safety events
    pub const SAFETY_ALERT_CREATED: &str = "nearcast.safety.alert.created";
    pub const SAFETY_EMERGENCY_CALLED: &str = "nearcast.safety.emergency.called";

    // Notification analytics
    pub const NOTIFICATION_PUSH_DEFERRED: &str = "nearcast.notification.push.deferred";
}

/// Common event data payloads
pub mod payloads {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PostLiked {
        pub post_id: Uuid,
        pub actor_id: Uuid,
        pub post_owner_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PostCommented {
        pub post_id: Uuid,
        pub comment_id: Uuid,
        pub actor_id: Uuid,
        pub post_owner_id: Uuid,
        pub comment_text: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserMentioned {
        pub post_id: Uuid,
        pub actor_id: Uuid,
        pub mentioned_user_id: Uuid,
        pub excerpt: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FriendRequested {
        pub request_id: Uuid,
        pub requester_id: Uuid,
        pub receiver_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MessageSent {
        pub message_id: Uuid,
        pub conversation_id: Uuid,
        pub sender_id: Uuid,
        pub receiver_id: Uuid,
        pub content_preview: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SafetyAlertCreated {
        pub alert_id: Uuid,
        pub creator_id: Uuid,
        pub latitude: f64,
        pub longitude: f64,
        /// Radius in meters; consumers apply their own default when absent.
        pub affected_area: Option<f64>,
        pub alert_type: String,
        pub severity: String,
        pub description: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EmergencyCalled {
        pub creator_id: Uuid,
        pub latitude: f64,
        pub longitude: f64,
        pub message: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PushDeferred {
        pub recipient_id: Uuid,
        pub title: String,
        pub reason: String,
        pub deferred_at: DateTime<Utc>,
    }
}
