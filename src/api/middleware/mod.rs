//! Dashboard middleware

pub mod dash_auth;
pub mod logging;
pub mod security;

pub use dash_auth::{clean_token, dash_auth_middleware};
pub use logging::logging_middleware;
pub use security::security_headers_middleware;
