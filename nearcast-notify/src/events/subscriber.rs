use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;
use serde::de::DeserializeOwned;

use nearcast_shared::types::event::{payloads, routing_keys, Event};

use crate::services::fanout::{FanoutCoordinator, FanoutSummary, SafetyAlert};
use crate::AppState;

fn decode<T: serde::Serialize + DeserializeOwned>(data: &[u8]) -> anyhow::Result<T> {
    Ok(serde_json::from_slice::<Event<T>>(data)?.data)
}

/// Route one domain event to the fan-out coordinator.
///
/// Unknown routing keys are ignored. Only a malformed body is an error.
pub async fn handle_event(
    coordinator: &FanoutCoordinator,
    routing_key: &str,
    data: &[u8],
) -> anyhow::Result<Option<FanoutSummary>> {
    let summary = match routing_key {
        routing_keys::SOCIAL_POST_LIKED => {
            let e: payloads::PostLiked = decode(data)?;
            coordinator.notify_like(e.actor_id, e.post_owner_id, e.post_id).await
        }
        routing_keys::SOCIAL_POST_COMMENTED => {
            let e: payloads::PostCommented = decode(data)?;
            coordinator
                .notify_comment(e.actor_id, e.post_owner_id, e.post_id, &e.comment_text)
                .await
        }
        routing_keys::SOCIAL_POST_MENTIONED => {
            let e: payloads::UserMentioned = decode(data)?;
            coordinator
                .notify_mention(e.actor_id, e.mentioned_user_id, e.post_id, &e.excerpt)
                .await
        }
        routing_keys::SOCIAL_FRIEND_REQUESTED => {
            let e: payloads::FriendRequested = decode(data)?;
            coordinator
                .notify_friend_request(e.requester_id, e.receiver_id, e.request_id)
                .await
        }
        routing_keys::MESSAGING_MESSAGE_SENT => {
            let e: payloads::MessageSent = decode(data)?;
            coordinator
                .notify_direct_message(e.sender_id, e.receiver_id, e.message_id, &e.content_preview)
                .await
        }
        routing_keys::SAFETY_ALERT_CREATED => {
            let e: payloads::SafetyAlertCreated = decode(data)?;
            let alert = SafetyAlert {
                alert_id: Some(e.alert_id),
                alert_type: e.alert_type,
                severity: Some(e.severity),
                description: e.description,
            };
            coordinator
                .notify_safety_alert(e.creator_id, e.latitude, e.longitude, e.affected_area, alert)
                .await?
        }
        routing_keys::SAFETY_EMERGENCY_CALLED => {
            let e: payloads::EmergencyCalled = decode(data)?;
            coordinator
                .notify_emergency(e.creator_id, e.latitude, e.longitude, &e.message)
                .await?
        }
        other => {
            tracing::debug!(routing_key = %other, "ignoring unrouted event");
            return Ok(None);
        }
    };

    Ok(Some(summary))
}

async fn consume(state: Arc<AppState>, queue: &str, keys: &[&str]) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(queue, keys).await?;

    tracing::info!(queue = %queue, "listening for events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.to_string();

                match handle_event(&state.coordinator, &routing_key, &delivery.data).await {
                    Ok(Some(summary)) => {
                        tracing::info!(
                            routing_key = %routing_key,
                            recipients = summary.recipients,
                            created = summary.notifications_created,
                            live = summary.live_delivered,
                            pushed = summary.push_sent,
                            "event fanned out"
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(error = %e, routing_key = %routing_key, "failed to handle event");
                    }
                }

                // Fan-out is best-effort; never redeliver.
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, queue = %queue, "consumer error");
            }
        }
    }

    Ok(())
}

/// Listen for social events (likes, comments, mentions, friend requests).
pub async fn listen_social_events(state: Arc<AppState>) -> anyhow::Result<()> {
    consume(
        state,
        "nearcast-notify.social",
        &[
            routing_keys::SOCIAL_POST_LIKED,
            routing_keys::SOCIAL_POST_COMMENTED,
            routing_keys::SOCIAL_POST_MENTIONED,
            routing_keys::SOCIAL_FRIEND_REQUESTED,
        ],
    )
    .await
}

/// Listen for message events (message.sent).
pub async fn listen_message_events(state: Arc<AppState>) -> anyhow::Result<()> {
    consume(
        state,
        "nearcast-notify.messaging",
        &[routing_keys::MESSAGING_MESSAGE_SENT],
    )
    .await
}

/// Listen for safety events (alert.created, emergency.called).
pub async fn listen_safety_events(state: Arc<AppState>) -> anyhow::Result<()> {
    consume(
        state,
        "nearcast-notify.safety",
        &[
            routing_keys::SAFETY_ALERT_CREATED,
            routing_keys::SAFETY_EMERGENCY_CALLED,
        ],
    )
    .await
}
