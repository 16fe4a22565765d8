//! Local backend: each task is a child process spawned via `tokio::process`.
mod config;
pub use config::LocalProcessConfig;

mod handler;
pub use handler::LocalProcessHandler;
