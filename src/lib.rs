//! Frontdesk Office Visitor Register
//!
//! A Rust REST API server for a single-office visitor register: check-ins
//! and check-outs, host notification emails with a scannable QR pass, and
//! admin review/export of visit history.

use std::sync::Arc;
use std::time::Instant;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub login_limiter: Arc<api::rate_limit::LoginRateLimiter>,
    pub started_at: Instant,
}
