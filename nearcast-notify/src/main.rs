use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use nearcast_notify::analytics::RabbitAnalyticsSink;
use nearcast_notify::config::AppConfig;
use nearcast_notify::live::{socket, ConnectionRegistry};
use nearcast_notify::push::apns::ApnsGateway;
use nearcast_notify::push::fcm::FcmGateway;
use nearcast_notify::push::PushGateway;
use nearcast_notify::routes::{alerts, devices, health, locations, notifications};
use nearcast_notify::services::fanout::FanoutCoordinator;
use nearcast_notify::services::push_dispatcher::{PushDispatcher, PushGateways};
use nearcast_notify::services::retention;
use nearcast_notify::store::postgres::PgStore;
use nearcast_notify::{events, AppState};
use nearcast_shared::clients::db;
use nearcast_shared::clients::rabbitmq::RabbitMQClient;
use nearcast_shared::clients::redis::RedisClient;

fn build_gateways(config: &AppConfig, http: &reqwest::Client) -> anyhow::Result<PushGateways> {
    let mut gateways = PushGateways::default();

    match config.fcm_credentials() {
        Some(creds) => {
            let gateway = FcmGateway::new(http.clone(), creds)?;
            gateways.fcm = Some(Arc::new(gateway) as Arc<dyn PushGateway>);
            tracing::info!("FCM gateway configured");
        }
        None => tracing::warn!("FCM credentials missing; FCM pushes will fail"),
    }

    match config.apns_credentials() {
        Some(creds) => {
            let sandbox = creds.sandbox;
            let gateway = ApnsGateway::new(http.clone(), creds)?;
            gateways.apns = Some(Arc::new(gateway) as Arc<dyn PushGateway>);
            tracing::info!(sandbox, "APNs gateway configured");
        }
        None => tracing::warn!("APNs credentials missing; APNs pushes will fail"),
    }

    Ok(gateways)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nearcast_shared::middleware::init_tracing("nearcast-notify");

    let config = AppConfig::load()?;
    let port = config.port;

    // Set JWT_SECRET env var for the auth extractor middleware
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let db = db::create_pool(&config.database_url, config.db_pool_size)?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let metrics_handle = nearcast_shared::middleware::init_metrics()?;

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;
    let gateways = build_gateways(&config, &http_client)?;

    let store = Arc::new(PgStore::new(db.clone()));
    let registry = Arc::new(ConnectionRegistry::new());
    let dispatcher = Arc::new(PushDispatcher::new(
        store.clone(),
        store.clone(),
        gateways,
        Arc::new(RabbitAnalyticsSink::new(rabbitmq.clone())),
    ));
    let coordinator = Arc::new(FanoutCoordinator::new(
        store.clone(),
        store.clone(),
        registry.clone(),
        dispatcher.clone(),
    ));

    retention::spawn_retention_sweep(
        store.clone(),
        config.retention_days,
        config.retention_sweep_interval_secs,
    );

    let state = Arc::new(AppState {
        config,
        db,
        redis,
        rabbitmq,
        metrics_handle,
        registry,
        coordinator,
        dispatcher,
        notifications: store.clone(),
        devices: store.clone(),
        locations: store,
    });

    let (sio_layer, io) = SocketIo::builder().build_layer();

    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef| {
            let state = state.clone();
            async move {
                socket::on_connect_with_state(socket, state).await;
            }
        }
    });

    let social_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_social_events(social_state).await {
            tracing::error!(error = %e, "social event subscriber failed");
        }
    });

    let message_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_message_events(message_state).await {
            tracing::error!(error = %e, "message event subscriber failed");
        }
    });

    let safety_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_safety_events(safety_state).await {
            tracing::error!(error = %e, "safety event subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/devices", post(devices::register_device))
        .route("/location", put(locations::update_location))
        .route("/nearby", get(locations::list_nearby))
        .route("/alerts/safety", post(alerts::create_safety_alert))
        .route("/alerts/emergency", post(alerts::create_emergency))
        .layer(axum::middleware::from_fn(nearcast_shared::middleware::metrics_middleware))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "nearcast-notify starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
