use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    FriendRequest,
    #[serde(rename = "dm")]
    DirectMessage,
    SafetyAlert,
    Emergency,
    Mention,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::FriendRequest => "friend_request",
            Self::DirectMessage => "dm",
            Self::SafetyAlert => "safety_alert",
            Self::Emergency => "emergency",
            Self::Mention => "mention",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "friend_request" => Ok(Self::FriendRequest),
            "dm" => Ok(Self::DirectMessage),
            "safety_alert" => Ok(Self::SafetyAlert),
            "emergency" => Ok(Self::Emergency),
            "mention" => Ok(Self::Mention),
            _ => Err(format!("unknown notification kind: {s}")),
        }
    }
}

/// One notification row. Every row has exactly one recipient; broadcasts
/// are stored as one row per recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    pub source_user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_user_id: Uuid,
    pub source_user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProvider {
    Fcm,
    Apns,
}

impl PushProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fcm => "fcm",
            Self::Apns => "apns",
        }
    }
}

impl std::fmt::Display for PushProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PushProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fcm" => Ok(Self::Fcm),
            "apns" => Ok(Self::Apns),
            _ => Err(format!("unknown push provider: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Ios,
    Android,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            _ => Err(format!("unknown device kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub token: String,
    pub provider: PushProvider,
    pub device_kind: Option<DeviceKind>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeviceToken {
    pub owner_user_id: Uuid,
    pub token: String,
    pub provider: PushProvider,
    pub device_kind: Option<DeviceKind>,
}

/// Last reported position of a user. One row per user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLocation {
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Do-not-disturb window, "HH:MM" local to `timezone` (UTC when absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub quiet_hours: Option<QuietHours>,
}
