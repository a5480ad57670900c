//! Infrastructure layer - Storage, Telegram transport, scheduling and services

pub mod logging;
pub mod rate_limiter;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod telegram;
