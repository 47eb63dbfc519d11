use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use nearcast_shared::errors::{AppError, ErrorCode};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::models::{DeviceToken, PushProvider};
use crate::push::{PushError, PushGateway, PushMessage};
use crate::services::quiet_hours;
use crate::store::{DeviceTokenStore, PreferencesStore};

/// The configured provider gateways. A `None` slot means no credentials.
#[derive(Clone, Default)]
pub struct PushGateways {
    pub fcm: Option<Arc<dyn PushGateway>>,
    pub apns: Option<Arc<dyn PushGateway>>,
}

impl PushGateways {
    pub fn get(&self, provider: PushProvider) -> Option<&Arc<dyn PushGateway>> {
        match provider {
            PushProvider::Fcm => self.fcm.as_ref(),
            PushProvider::Apns => self.apns.as_ref(),
        }
    }

    pub fn is_configured(&self, provider: PushProvider) -> bool {
        self.get(provider).is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("push configuration error: {0}")]
    Configuration(String),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        AppError::new(ErrorCode::PushNotConfigured, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceOutcome {
    Sent { message_id: Option<String> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDelivery {
    pub token_id: Uuid,
    pub provider: PushProvider,
    pub outcome: DeviceOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub devices: Vec<DeviceDelivery>,
}

/// Result of one dispatch. Deferred pushes are dropped, not queued.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Deferred,
    Delivered(DispatchSummary),
}

impl DispatchOutcome {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }

    pub fn summary(&self) -> Option<&DispatchSummary> {
        match self {
            Self::Deferred => None,
            Self::Delivered(summary) => Some(summary),
        }
    }
}

pub struct PushDispatcher {
    preferences: Arc<dyn PreferencesStore>,
    tokens: Arc<dyn DeviceTokenStore>,
    gateways: PushGateways,
    analytics: Arc<dyn AnalyticsSink>,
}

impl PushDispatcher {
    pub fn new(
        preferences: Arc<dyn PreferencesStore>,
        tokens: Arc<dyn DeviceTokenStore>,
        gateways: PushGateways,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            preferences,
            tokens,
            gateways,
            analytics,
        }
    }

    pub fn gateways(&self) -> &PushGateways {
        &self.gateways
    }

    /// Push `message` to every registered device of `recipient_id`.
    ///
    /// Per-device failures are counted, never raised. Only a missing or
    /// unusable provider configuration fails the call.
    pub async fn dispatch(
        &self,
        recipient_id: Uuid,
        message: PushMessage,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch_at(recipient_id, message, Utc::now()).await
    }

    pub async fn dispatch_at(
        &self,
        recipient_id: Uuid,
        message: PushMessage,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let prefs = match self.preferences.get(recipient_id).await {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %recipient_id, "preferences lookup failed, delivering anyway");
                None
            }
        };

        if quiet_hours::is_quiet_at(prefs.as_ref(), now) {
            tracing::debug!(user_id = %recipient_id, "push deferred by quiet hours");
            counter!("push_deferred_total").increment(1);
            self.analytics.record(AnalyticsEvent::PushDeferred {
                recipient_id,
                title: message.title,
                reason: "quiet_hours".into(),
                at: now,
            });
            return Ok(DispatchOutcome::Deferred);
        }

        let tokens = match self.tokens.list_for_user(recipient_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(error = %e, user_id = %recipient_id, "device token lookup failed");
                Vec::new()
            }
        };

        if tokens.is_empty() {
            return Ok(DispatchOutcome::Delivered(DispatchSummary::default()));
        }

        if let Some(missing) = tokens.iter().find(|t| !self.gateways.is_configured(t.provider)) {
            tracing::error!(
                provider = %missing.provider,
                user_id = %recipient_id,
                "device token for unconfigured push provider"
            );
            return Err(DispatchError::Configuration(format!(
                "{} gateway is not configured",
                missing.provider
            )));
        }

        let results = join_all(tokens.iter().map(|token| self.send_one(token, &message))).await;

        let mut summary = DispatchSummary {
            total: tokens.len(),
            ..Default::default()
        };

        for (token, result) in tokens.iter().zip(results) {
            let outcome = match result {
                Ok(receipt) => {
                    summary.successful += 1;
                    DeviceOutcome::Sent {
                        message_id: receipt.message_id,
                    }
                }
                Err(PushError::Configuration(reason)) => {
                    tracing::error!(provider = %token.provider, reason = %reason, "push provider rejected credentials");
                    return Err(DispatchError::Configuration(reason));
                }
                Err(e) => {
                    summary.failed += 1;
                    DeviceOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            summary.devices.push(DeviceDelivery {
                token_id: token.id,
                provider: token.provider,
                outcome,
            });
        }

        tracing::info!(
            user_id = %recipient_id,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "push dispatched"
        );

        Ok(DispatchOutcome::Delivered(summary))
    }

    async fn send_one(
        &self,
        token: &DeviceToken,
        message: &PushMessage,
    ) -> Result<crate::push::DeliveryReceipt, PushError> {
        let gateway = self
            .gateways
            .get(token.provider)
            .ok_or_else(|| PushError::Configuration(format!("{} gateway is not configured", token.provider)))?;

        let result = gateway.send(&token.token, message).await;
        let outcome = match &result {
            Ok(_) => "sent",
            Err(PushError::Transient(_)) => "transient",
            Err(PushError::Rejected { .. }) => "rejected",
            Err(PushError::Configuration(_)) => "misconfigured",
        };
        counter!("push_deliveries_total", "provider" => token.provider.as_str(), "outcome" => outcome)
            .increment(1);

        if let Err(e) = &result {
            tracing::warn!(token_id = %token.id, provider = %token.provider, error = %e, "push delivery failed");
        }

        result
    }
}
