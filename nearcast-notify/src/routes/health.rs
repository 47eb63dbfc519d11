use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::prelude::*;

use nearcast_shared::clients::db;
use nearcast_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::models::PushProvider;
use crate::AppState;

/// Health check probing Postgres, Redis, RabbitMQ and push configuration.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let mut checks = Vec::with_capacity(5);

    let pool = state.db.clone();
    let db_check = tokio::task::spawn_blocking(move || -> Result<(), String> {
        let mut conn = db::checkout(&pool).map_err(|e| e.to_string())?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await;

    checks.push(match db_check {
        Ok(Ok(())) => HealthCheck::healthy("postgres"),
        Ok(Err(e)) => HealthCheck::failing("postgres", HealthStatus::Unhealthy, e),
        Err(e) => HealthCheck::failing("postgres", HealthStatus::Unhealthy, e.to_string()),
    });

    checks.push(match state.redis.ping().await {
        Ok(()) => HealthCheck::healthy("redis"),
        // Presence only; live delivery still works without it.
        Err(e) => HealthCheck::failing("redis", HealthStatus::Degraded, e.to_string()),
    });

    checks.push(if state.rabbitmq.is_connected() {
        HealthCheck::healthy("rabbitmq")
    } else {
        HealthCheck::failing("rabbitmq", HealthStatus::Unhealthy, "channel disconnected")
    });

    for provider in [PushProvider::Fcm, PushProvider::Apns] {
        let name = format!("push.{provider}");
        checks.push(if state.dispatcher.gateways().is_configured(provider) {
            HealthCheck::healthy(name)
        } else {
            HealthCheck::failing(name, HealthStatus::Degraded, "credentials not configured")
        });
    }

    let response = HealthResponse::healthy("nearcast-notify", env!("CARGO_PKG_VERSION"))
        .with_checks(checks);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
