mod annotate;
mod detector;
mod log_store;
mod pipeline;
mod routes;
mod server;

pub mod app;
pub mod config;

pub use app::start_app;
