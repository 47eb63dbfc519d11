use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socketioxide::extract::{Data, SocketRef};
use uuid::Uuid;

use nearcast_shared::errors::AppError;
use nearcast_shared::middleware::validate_jwt;

use super::ConnectionHandle;
use crate::services::fanout::SafetyAlert;
use crate::AppState;

const PRESENCE_TTL_SECS: u64 = 120;

/// A Socket.IO connection as seen by the registry.
pub struct SocketHandle {
    socket: SocketRef,
}

impl SocketHandle {
    pub fn new(socket: SocketRef) -> Self {
        Self { socket }
    }
}

impl ConnectionHandle for SocketHandle {
    fn connection_id(&self) -> String {
        self.socket.id.to_string()
    }

    fn emit(&self, event: &str, payload: &serde_json::Value) -> Result<(), String> {
        self.socket
            .emit(event.to_string(), payload)
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().map(|c| c.code().to_string()).unwrap_or_else(|| "E0001".into()),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocationUpdate {
    lat: f64,
    lon: f64,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SafetyAlertRequest {
    lat: f64,
    lon: f64,
    #[serde(default)]
    affected_area: Option<f64>,
    #[serde(flatten)]
    alert: SafetyAlert,
}

#[derive(Debug, Deserialize)]
struct EmergencyRequest {
    lat: f64,
    lon: f64,
    #[serde(default)]
    message: String,
}

fn presence_key(user_id: Uuid) -> String {
    format!("online:notify:{user_id}")
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}

/// Value of `token` in a raw query string.
fn token_from_query(query: &str) -> Option<&str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then_some(value)
    })
}

fn authenticate_socket(socket: &SocketRef, state: &AppState) -> Result<Uuid, String> {
    let query = socket.req_parts().uri.query().unwrap_or_default();
    let token = token_from_query(query).ok_or_else(|| "missing token query parameter".to_string())?;

    validate_jwt(token, &state.config.jwt_secret)
        .map(|claims| claims.sub)
        .map_err(|e| e.to_string())
}

fn emit_error(socket: &SocketRef, err: &AppError) {
    let _ = socket.emit("error", &ErrorPayload::from(err));
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let user_id = match authenticate_socket(&socket, &state) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(error = %msg, "notify socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "AUTH_FAILED".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);
    state
        .registry
        .register(user_id, Arc::new(SocketHandle::new(socket.clone())));

    tracing::info!(user_id = %user_id, sid = %socket.id, "notify socket connected");

    let _ = state.redis.set(&presence_key(user_id), "1", PRESENCE_TTL_SECS).await;
    let _ = socket.emit("connected", &serde_json::json!({ "user_id": user_id }));

    socket.on("update_location", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_update_location(socket, payload, &state).await; }
        }
    });

    socket.on("safety_alert", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_safety_alert(socket, payload, &state).await; }
        }
    });

    socket.on("emergency_call", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_emergency_call(socket, payload, &state).await; }
        }
    });

    // Heartbeat refreshes the presence TTL
    socket.on("heartbeat", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                if let Some(user_id) = get_user_id(&socket) {
                    let _ = state.redis.set(&presence_key(user_id), "1", PRESENCE_TTL_SECS).await;
                }
            }
        }
    });

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                on_disconnect_with_state(socket, state).await;
            }
        }
    });
}

async fn on_disconnect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else {
        return;
    };

    tracing::info!(user_id = %user_id, sid = %socket.id, "notify socket disconnected");

    // A newer session for the same user keeps its registry entry and presence.
    if state.registry.unregister(user_id, &socket.id.to_string()) {
        let _ = state.redis.del(&presence_key(user_id)).await;
    }
}

async fn on_update_location(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else {
        return;
    };

    let update: LocationUpdate = match serde_json::from_value(payload) {
        Ok(u) => u,
        Err(e) => {
            emit_error(&socket, &AppError::bad_request(format!("invalid location payload: {e}")));
            return;
        }
    };

    match state
        .coordinator
        .notify_location_update(user_id, update.lat, update.lon, update.address)
        .await
    {
        Ok(broadcast) => {
            let nearby: Vec<serde_json::Value> = broadcast
                .nearby
                .iter()
                .map(|n| serde_json::json!({ "user_id": n.user_id, "distance_m": n.distance_m.round() }))
                .collect();
            let _ = socket.emit("nearby_users", &nearby);
        }
        Err(e) => emit_error(&socket, &e),
    }
}

async fn on_safety_alert(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else {
        return;
    };

    let request: SafetyAlertRequest = match serde_json::from_value(payload) {
        Ok(r) => r,
        Err(e) => {
            emit_error(&socket, &AppError::bad_request(format!("invalid safety alert payload: {e}")));
            return;
        }
    };

    match state
        .coordinator
        .notify_safety_alert(user_id, request.lat, request.lon, request.affected_area, request.alert)
        .await
    {
        Ok(summary) => {
            let _ = socket.emit("safety_alert_sent", &summary);
        }
        Err(e) => emit_error(&socket, &e),
    }
}

async fn on_emergency_call(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else {
        return;
    };

    let request: EmergencyRequest = match serde_json::from_value(payload) {
        Ok(r) => r,
        Err(e) => {
            emit_error(&socket, &AppError::bad_request(format!("invalid emergency payload: {e}")));
            return;
        }
    };

    match state
        .coordinator
        .notify_emergency(user_id, request.lat, request.lon, &request.message)
        .await
    {
        Ok(summary) => {
            let _ = socket.emit("emergency_sent", &summary);
        }
        Err(e) => emit_error(&socket, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_token_from_query() {
        assert_eq!(token_from_query("EIO=4&token=abc.def&transport=websocket"), Some("abc.def"));
        assert_eq!(token_from_query("token="), None);
        assert_eq!(token_from_query("EIO=4"), None);
        assert_eq!(token_from_query(""), None);
    }

    #[test]
    fn safety_alert_request_flattens_alert_fields() {
        let request: SafetyAlertRequest = serde_json::from_value(serde_json::json!({
            "lat": 40.7,
            "lon": -74.0,
            "affected_area": 2000,
            "alert_type": "flood",
            "description": "Water over the road",
        }))
        .unwrap();

        assert_eq!(request.affected_area, Some(2000.0));
        assert_eq!(request.alert.alert_type, "flood");
        assert!(request.alert.severity.is_none());
    }

    #[test]
    fn error_payload_uses_error_code() {
        let err = AppError::new(nearcast_shared::errors::ErrorCode::InvalidRadius, "bad radius");
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.code, "E5003");
    }
}
