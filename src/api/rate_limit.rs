//! Per-address rate limiting for the login endpoint.
//!
//! Process-wide admission counters keyed by caller address; each key gets
//! its own limiter with atomic check semantics.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, RwLock},
};

use crate::error::ErrorResponse;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct LoginRateLimiter {
    limiters: RwLock<HashMap<String, Arc<DirectLimiter>>>,
    per_minute: u32,
}

impl LoginRateLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            per_minute,
        }
    }

    pub fn enabled(&self) -> bool {
        self.per_minute > 0
    }

    fn get_or_create(&self, key: &str) -> Arc<DirectLimiter> {
        {
            let limiters = self.limiters.read().unwrap();
            if let Some(limiter) = limiters.get(key) {
                return limiter.clone();
            }
        }

        let mut limiters = self.limiters.write().unwrap();
        // Another request may have created it between the locks
        if let Some(limiter) = limiters.get(key) {
            return limiter.clone();
        }

        let quota = Quota::per_minute(
            NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::new(10).unwrap()),
        );
        let limiter = Arc::new(RateLimiter::direct(quota));
        limiters.insert(key.to_string(), limiter.clone());
        limiter
    }

    /// Ok when the request is admitted, Err with retry-after seconds otherwise
    pub fn check(&self, key: &str) -> Result<(), u64> {
        match self.get_or_create(key).check() {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait.as_secs().max(1))
            }
        }
    }
}

/// Middleware guarding the login route
pub async fn login_rate_limit(
    State(state): State<crate::AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.login_limiter.enabled() {
        return next.run(request).await;
    }

    let key = caller_key(&request);
    if let Err(retry_after) = state.login_limiter.check(&key) {
        return rate_limited_response(state.config.rate_limit.login_per_minute, retry_after);
    }

    next.run(request).await
}

fn caller_key(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = Json(ErrorResponse {
        code: "RATE_LIMITED".to_string(),
        message: format!("Rate limit of {} login attempts per minute exceeded", limit),
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    if let Ok(value) = retry_after.to_string().parse() {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = LoginRateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
        let rejected = limiter.check("10.0.0.1");
        assert!(rejected.is_err());
        assert!(rejected.unwrap_err() >= 1);
    }

    #[test]
    fn addresses_are_limited_independently() {
        let limiter = LoginRateLimiter::new(1);
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.2").is_ok());
        assert!(limiter.check("10.0.0.1").is_err());
    }

    #[test]
    fn zero_limit_means_disabled() {
        let limiter = LoginRateLimiter::new(0);
        assert!(!limiter.enabled());
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let response = rate_limited_response(10, 42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
