use crate::errors::AppError;
use axum::http::{header, HeaderMap};
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

pub fn require_bearer(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let token = extract_bearer(headers).ok_or(AppError::Unauthorized)?;
    let matches: bool = token.as_bytes().ct_eq(expected.as_bytes()).into();
    if !matches {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub fn check_origin(headers: &HeaderMap, allowed: &[String]) -> Result<(), AppError> {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::OriginDenied)?;
    if allowed.iter().any(|o| o == origin) {
        Ok(())
    } else {
        Err(AppError::OriginDenied)
    }
}

pub fn content_length_ok(headers: &HeaderMap, max_kb: usize) -> Result<(), AppError> {
    if let Some(len) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if len > max_kb.saturating_mul(1024) {
            return Err(AppError::RequestTooLarge);
        }
    }
    Ok(())
}

/// Global and per-token request limits.
#[derive(Clone)]
pub struct RateLimiters {
    global: Arc<DefaultDirectRateLimiter>,
    per_token: Arc<DefaultKeyedRateLimiter<String>>,
}

impl RateLimiters {
    pub fn new(global_per_sec: u32, global_burst: u32, token_per_sec: u32, token_burst: u32) -> Self {
        Self {
            global: Arc::new(RateLimiter::direct(quota(global_per_sec, global_burst))),
            per_token: Arc::new(RateLimiter::keyed(quota(token_per_sec, token_burst))),
        }
    }

    pub fn check(&self, token: Option<&str>) -> Result<(), AppError> {
        self.global.check().map_err(|_| AppError::RateLimited)?;
        if let Some(t) = token {
            self.per_token.check_key(&t.to_string()).map_err(|_| AppError::RateLimited)?;
        }
        Ok(())
    }
}

fn quota(per_sec: u32, burst: u32) -> Quota {
    let rate = NonZeroU32::new(per_sec).unwrap_or(nonzero!(1u32));
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    Quota::per_second(rate).allow_burst(burst)
}
