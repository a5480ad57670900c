//! Dashboard HTTP layer - endpoints and middleware

pub mod dashboard;
pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;

pub use router::create_router;
pub use state::AppState;
