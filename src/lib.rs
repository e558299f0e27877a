pub mod config;
pub mod dashboard;
pub mod estimator;
pub mod record;
pub mod render;
pub mod server;
pub mod source;
