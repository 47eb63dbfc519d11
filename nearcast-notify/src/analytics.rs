use chrono::{DateTime, Utc};
use uuid::Uuid;

use nearcast_shared::clients::rabbitmq::RabbitMQClient;
use nearcast_shared::types::event::{payloads, routing_keys, Event};

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    PushDeferred {
        recipient_id: Uuid,
        title: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Fire-and-forget analytics. Implementations must not block or fail the caller.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: AnalyticsEvent);
}

/// Publishes analytics events to the domain event exchange.
#[derive(Clone)]
pub struct RabbitAnalyticsSink {
    rabbitmq: RabbitMQClient,
}

impl RabbitAnalyticsSink {
    pub fn new(rabbitmq: RabbitMQClient) -> Self {
        Self { rabbitmq }
    }
}

impl AnalyticsSink for RabbitAnalyticsSink {
    fn record(&self, event: AnalyticsEvent) {
        let rabbitmq = self.rabbitmq.clone();

        tokio::spawn(async move {
            match event {
                AnalyticsEvent::PushDeferred {
                    recipient_id,
                    title,
                    reason,
                    at,
                } => {
                    let event = Event::new(
                        "nearcast-notify",
                        routing_keys::NOTIFICATION_PUSH_DEFERRED,
                        payloads::PushDeferred {
                            recipient_id,
                            title,
                            reason,
                            deferred_at: at,
                        },
                    )
                    .with_user(recipient_id);

                    if let Err(e) = rabbitmq
                        .publish(routing_keys::NOTIFICATION_PUSH_DEFERRED, &event)
                        .await
                    {
                        tracing::warn!(error = %e, user_id = %recipient_id, "failed to publish push.deferred");
                    }
                }
            }
        });
    }
}
