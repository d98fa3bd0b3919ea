//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use campusdesk_common::{config::RateLimitConfig, errors::AppError};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide token bucket
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter plus the configured rate, reported back on rejection
pub struct RateLimit {
    limiter: GlobalRateLimiter,
    requests_per_second: u32,
}

/// Create a new rate limiter
pub fn create_rate_limiter(config: &RateLimitConfig) -> Result<Arc<RateLimit>, AppError> {
    let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
        AppError::Configuration {
            message: "rate_limit.requests_per_second must be positive".to_string(),
        }
    })?;
    let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);

    Ok(Arc::new(RateLimit {
        limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
        requests_per_second: config.requests_per_second,
    }))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limit): State<Arc<RateLimit>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match limit.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: limit.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests_per_second: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second,
            burst,
            enabled: true,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limit = create_rate_limiter(&config(100, 200)).unwrap();
        assert!(limit.limiter.check().is_ok());
    }

    #[test]
    fn test_burst_is_exhausted() {
        let limit = create_rate_limiter(&config(1, 2)).unwrap();
        assert!(limit.limiter.check().is_ok());
        assert!(limit.limiter.check().is_ok());
        assert!(limit.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        assert!(matches!(
            create_rate_limiter(&config(0, 10)),
            Err(AppError::Configuration { .. })
        ));
    }
}
