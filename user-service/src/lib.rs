pub mod app;
pub mod config;
pub mod metrics;
pub mod middleware;
pub mod passwords;
pub mod store;
pub mod user_handlers;

pub use app::{build_router, AppState};
pub use config::{load_service_config, ServiceConfig};
