//! Push provider gateways.
//!
//! Each gateway delivers one message to one device token and reports the
//! outcome as a value. Ordinary delivery failures (bad token, throttling,
//! provider outage) come back as `PushError`, never as a panic.

pub mod apns;
pub mod fcm;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;

use crate::models::PushProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// String-valued payload; both providers only carry flat string maps.
    pub data: BTreeMap<String, String>,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Provider-assigned id, when the provider returns one.
    pub message_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Timeouts, throttling and provider-side outages.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The provider refused this message or token.
    #[error("provider rejected message ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Credentials missing or unusable. Fatal for a whole dispatch.
    #[error("push provider misconfigured: {0}")]
    Configuration(String),
}

impl PushError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Map a non-2xx provider response to an error.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let reason = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body.chars().take(200).collect()
        };

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(format!("{status}: {reason}"))
        } else {
            Self::Rejected { status: status.as_u16(), reason }
        }
    }
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

/// A provider auth token reused until shortly before it expires.
#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    pub value: String,
    pub refresh_after: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.refresh_after
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    fn provider(&self) -> PushProvider;

    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<DeliveryReceipt, PushError>;
}
