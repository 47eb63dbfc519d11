use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{CachedToken, DeliveryReceipt, Priority, PushError, PushGateway, PushMessage};
use crate::models::PushProvider;

const FCM_API_BASE: &str = "https://fcm.googleapis.com";
const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Refresh the OAuth token this long before Google says it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Service-account credentials for the FCM HTTP v1 API.
#[derive(Debug, Clone)]
pub struct FcmCredentials {
    pub project_id: String,
    pub client_email: String,
    /// PEM-encoded RSA private key of the service account.
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: Option<String>,
}

pub struct FcmGateway {
    http: Client,
    credentials: FcmCredentials,
    signing_key: EncodingKey,
    api_base: String,
    access_token: RwLock<Option<CachedToken>>,
}

impl FcmGateway {
    pub fn new(http: Client, credentials: FcmCredentials) -> Result<Self, PushError> {
        let signing_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| PushError::Configuration(format!("invalid FCM private key: {e}")))?;

        Ok(Self {
            http,
            credentials,
            signing_key,
            api_base: FCM_API_BASE.to_string(),
            access_token: RwLock::new(None),
        })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base, self.credentials.project_id
        )
    }

    fn assertion(&self) -> Result<String, PushError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.credentials.client_email,
            scope: FCM_SCOPE,
            aud: &self.credentials.token_uri,
            iat: now,
            exp: now + 3600,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| PushError::Configuration(format!("failed to sign FCM assertion: {e}")))
    }

    async fn access_token(&self) -> Result<String, PushError> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.access_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.assertion()?;
        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "FCM token exchange failed");
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    PushError::Configuration(format!("FCM credentials rejected: {status}"))
                }
                _ => PushError::from_status(status, &body),
            });
        }

        let token: TokenResponse = response.json().await?;
        let refresh_after =
            Utc::now() + Duration::seconds(token.expires_in - TOKEN_REFRESH_MARGIN_SECS);

        tracing::debug!(expires_in = token.expires_in, "refreshed FCM access token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_after,
        });

        Ok(token.access_token)
    }
}

/// Request body for `messages:send`.
pub fn build_message(device_token: &str, message: &PushMessage) -> serde_json::Value {
    let android_priority = match message.priority {
        Priority::High => "HIGH",
        Priority::Normal => "NORMAL",
    };

    serde_json::json!({
        "message": {
            "token": device_token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
            "android": {
                "priority": android_priority,
            },
        }
    })
}

#[async_trait]
impl PushGateway for FcmGateway {
    fn provider(&self) -> PushProvider {
        PushProvider::Fcm
    }

    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<DeliveryReceipt, PushError> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(&access_token)
            .json(&build_message(device_token, message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response.json().await?;
            return Ok(DeliveryReceipt { message_id: body.name });
        }

        if status == StatusCode::UNAUTHORIZED {
            // Token revoked early; force a refresh on the next send.
            *self.access_token.write().await = None;
        }

        let body = response.text().await.unwrap_or_default();
        Err(PushError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn credentials(private_key: &str) -> FcmCredentials {
        FcmCredentials {
            project_id: "nearcast-dev".into(),
            client_email: "push@nearcast-dev.iam.gserviceaccount.com".into(),
            private_key: private_key.into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
        }
    }

    #[test]
    fn invalid_key_is_configuration_error() {
        let err = FcmGateway::new(Client::new(), credentials("not a pem")).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn message_body_shape() {
        let mut data = BTreeMap::new();
        data.insert("notification_id".to_string(), "abc".to_string());
        let message = PushMessage {
            title: "Safety alert nearby".into(),
            body: "Road closed".into(),
            data,
            priority: Priority::High,
        };

        let body = build_message("device-1", &message);
        assert_eq!(body["message"]["token"], "device-1");
        assert_eq!(body["message"]["notification"]["title"], "Safety alert nearby");
        assert_eq!(body["message"]["data"]["notification_id"], "abc");
        assert_eq!(body["message"]["android"]["priority"], "HIGH");
    }

    #[test]
    fn normal_priority_maps_to_normal() {
        let message = PushMessage {
            title: "t".into(),
            body: "b".into(),
            data: BTreeMap::new(),
            priority: Priority::Normal,
        };
        assert_eq!(build_message("x", &message)["message"]["android"]["priority"], "NORMAL");
    }
}
