pub mod analytics;
pub mod config;
pub mod events;
pub mod geo;
pub mod live;
pub mod models;
pub mod push;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use nearcast_shared::clients::db::DbPool;
use nearcast_shared::clients::rabbitmq::RabbitMQClient;
use nearcast_shared::clients::redis::RedisClient;

use live::ConnectionRegistry;
use services::fanout::FanoutCoordinator;
use services::push_dispatcher::PushDispatcher;
use store::{DeviceTokenStore, LocationStore, NotificationStore};

pub struct AppState {
    pub config: config::AppConfig,
    pub db: DbPool,
    pub redis: RedisClient,
    pub rabbitmq: RabbitMQClient,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub registry: Arc<ConnectionRegistry>,
    pub coordinator: Arc<FanoutCoordinator>,
    pub dispatcher: Arc<PushDispatcher>,
    pub notifications: Arc<dyn NotificationStore>,
    pub devices: Arc<dyn DeviceTokenStore>,
    pub locations: Arc<dyn LocationStore>,
}
