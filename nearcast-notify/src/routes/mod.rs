pub mod alerts;
pub mod devices;
pub mod health;
pub mod locations;
pub mod notifications;

use nearcast_shared::errors::{AppError, ErrorCode};

pub(crate) fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::new(ErrorCode::ValidationError, e.to_string())
}
