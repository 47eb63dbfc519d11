pub mod fanout;
pub mod nearby;
pub mod notification_service;
pub mod push_dispatcher;
pub mod quiet_hours;
pub mod retention;
