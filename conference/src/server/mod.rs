//! HTTP server: shared state, health endpoints and routing.

pub mod health;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
