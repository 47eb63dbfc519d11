use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{CachedToken, DeliveryReceipt, Priority, PushError, PushGateway, PushMessage};
use crate::models::PushProvider;

const APNS_PRODUCTION_HOST: &str = "https://api.push.apple.com";
const APNS_SANDBOX_HOST: &str = "https://api.sandbox.push.apple.com";
/// Apple rejects provider tokens older than an hour.
const PROVIDER_TOKEN_TTL_MINS: i64 = 50;

#[derive(Debug, Clone)]
pub struct ApnsCredentials {
    pub team_id: String,
    pub key_id: String,
    /// PEM-encoded P-256 signing key (.p8).
    pub private_key: String,
    pub bundle_id: String,
    pub sandbox: bool,
}

#[derive(Debug, Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

pub struct ApnsGateway {
    http: Client,
    credentials: ApnsCredentials,
    signing_key: EncodingKey,
    host: &'static str,
    provider_token: RwLock<Option<CachedToken>>,
}

impl ApnsGateway {
    pub fn new(http: Client, credentials: ApnsCredentials) -> Result<Self, PushError> {
        let signing_key = EncodingKey::from_ec_pem(credentials.private_key.as_bytes())
            .map_err(|e| PushError::Configuration(format!("invalid APNs signing key: {e}")))?;

        let host = if credentials.sandbox {
            APNS_SANDBOX_HOST
        } else {
            APNS_PRODUCTION_HOST
        };

        Ok(Self {
            http,
            credentials,
            signing_key,
            host,
            provider_token: RwLock::new(None),
        })
    }

    async fn provider_token(&self) -> Result<String, PushError> {
        if let Some(token) = self.provider_token.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.provider_token.write().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let now = Utc::now();
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.credentials.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.credentials.team_id,
            iat: now.timestamp(),
        };

        let value = jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| PushError::Configuration(format!("failed to sign APNs token: {e}")))?;

        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_after: now + Duration::minutes(PROVIDER_TOKEN_TTL_MINS),
        });

        Ok(value)
    }
}

/// The `aps` payload for an alert push. Custom data sits beside `aps`.
pub fn build_payload(message: &PushMessage) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "aps": {
            "alert": {
                "title": message.title,
                "body": message.body,
            },
            "sound": "default",
        }
    });

    if let Some(obj) = payload.as_object_mut() {
        for (key, value) in &message.data {
            if key != "aps" {
                obj.insert(key.clone(), serde_json::Value::String(value.clone()));
            }
        }
    }

    payload
}

fn apns_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "10",
        Priority::Normal => "5",
    }
}

#[async_trait]
impl PushGateway for ApnsGateway {
    fn provider(&self) -> PushProvider {
        PushProvider::Apns
    }

    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<DeliveryReceipt, PushError> {
        if device_token.is_empty() || !device_token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PushError::Rejected {
                status: 400,
                reason: "BadDeviceToken".into(),
            });
        }

        let token = self.provider_token().await?;

        let response = self
            .http
            .post(format!("{}/3/device/{}", self.host, device_token))
            .bearer_auth(&token)
            .header("apns-topic", &self.credentials.bundle_id)
            .header("apns-push-type", "alert")
            .header("apns-priority", apns_priority(message.priority))
            .json(&build_payload(message))
            .send()
            .await?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if status.is_success() {
            return Ok(DeliveryReceipt { message_id });
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("InvalidProviderToken") || body.contains("ExpiredProviderToken") {
            *self.provider_token.write().await = None;
        }

        Err(PushError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn message(priority: Priority) -> PushMessage {
        let mut data = BTreeMap::new();
        data.insert("kind".to_string(), "emergency".to_string());
        data.insert("aps".to_string(), "ignored".to_string());
        PushMessage {
            title: "Emergency nearby".into(),
            body: "Someone near you needs help".into(),
            data,
            priority,
        }
    }

    #[test]
    fn payload_nests_alert_under_aps() {
        let payload = build_payload(&message(Priority::High));
        assert_eq!(payload["aps"]["alert"]["title"], "Emergency nearby");
        assert_eq!(payload["aps"]["sound"], "default");
        assert_eq!(payload["kind"], "emergency");
    }

    #[test]
    fn custom_data_cannot_clobber_aps() {
        let payload = build_payload(&message(Priority::Normal));
        assert!(payload["aps"].is_object());
    }

    #[test]
    fn priority_header_values() {
        assert_eq!(apns_priority(Priority::High), "10");
        assert_eq!(apns_priority(Priority::Normal), "5");
    }

    #[test]
    fn invalid_key_is_configuration_error() {
        let credentials = ApnsCredentials {
            team_id: "TEAM123456".into(),
            key_id: "KEY1234567".into(),
            private_key: "not a pem key".into(),
            bundle_id: "app.nearcast".into(),
            sandbox: true,
        };
        let err = ApnsGateway::new(Client::new(), credentials).err().unwrap();
        assert!(err.is_configuration());
    }
}
