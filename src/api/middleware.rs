//! API Middleware (Request IDs, Rate Limiting, Logging) and credential helpers

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handlers::{error_response, AppState};
use super::types::RequestContext;
use crate::models::errors::{AppError, AppResult};
use crate::utils::hashing::sha256_hex;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Rate limiter configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests per window; 0 disables limiting
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests_per_window: requests,
            window_duration: Duration::from_secs(60),
        }
    }
}

/// Decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_secs: u64,
}

/// Fixed-window limiter keyed by API key or client IP
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let limit = self.config.requests_per_window;
        if limit == 0 {
            return RateDecision {
                allowed: true,
                remaining: u32::MAX,
                reset_secs: 0,
            };
        }

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.config.window_duration {
            *entry = (0, now);
        }

        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= limit {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_secs,
            };
        }

        entry.0 += 1;
        RateDecision {
            allowed: true,
            remaining: limit - entry.0,
            reset_secs,
        }
    }

    /// Drop windows that ended long ago
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        let window = self.config.window_duration;
        self.requests
            .retain(|_, (_, started)| now.duration_since(*started) < window * 2);
        before - self.requests.len()
    }
}

/// Periodic limiter cleanup
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = limiter.cleanup();
            if removed > 0 {
                debug!(removed, "🧹 Rate limiter cleanup");
            }
        }
    })
}

// ============================================
// Credential extraction
// ============================================

/// API key from `x-api-key` or `Authorization: Bearer <token>`
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());
    if let Some(key) = direct {
        return Some(key.to_string());
    }

    let auth = headers.get("authorization")?.to_str().ok()?;
    let (scheme, value) = auth.split_once(' ')?;
    let value = value.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

/// Admin routes need `x-admin-token` equal to the configured token
pub fn require_admin(expected: Option<&str>, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = expected else {
        return Err(AppError::forbidden());
    };
    match headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        // compare digests, never the raw secrets
        Some(presented) if sha256_hex(presented) == sha256_hex(expected) => Ok(()),
        _ => {
            warn!("Admin request rejected");
            Err(AppError::forbidden())
        }
    }
}

fn client_key(headers: &HeaderMap) -> String {
    extract_api_key(headers)
        .map(|k| format!("key:{}", k))
        .unwrap_or_else(|| {
            let ip = headers
                .get("x-forwarded-for")
                .or_else(|| headers.get("x-real-ip"))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .unwrap_or("unknown");
            format!("ip:{}", ip)
        })
}

// ============================================
// Middleware
// ============================================

/// Echo or mint `x-request-id` and expose it to handlers
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestContext::new(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Rate limiting for `/api/` routes
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !request.uri().path().starts_with("/api/") {
        return next.run(request).await;
    }

    let key = client_key(request.headers());
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        warn!(reset_secs = decision.reset_secs, "Rate limit exceeded");
        let ctx = request
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::new(Uuid::new_v4().to_string()));
        let mut response = error_response(&ctx, AppError::rate_limited(decision.reset_secs));
        response
            .headers_mut()
            .insert("retry-after", decision.reset_secs.into());
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-remaining", decision.remaining.into());
    headers.insert("x-ratelimit-reset", decision.reset_secs.into());
    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|c| c.request_id.clone())
        .unwrap_or_default();

    let response = next.run(request).await;

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
