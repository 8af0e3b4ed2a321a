pub mod auth;
pub mod chat;
pub mod config;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod retrieval;
pub mod server;

pub use config::AppConfig;
pub use server::run_server;
