pub mod auth;
pub mod config;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::Settings;
pub use routes::router;
pub use state::AppState;
