//! API Request Handlers

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use super::middleware::{extract_api_key, require_admin, RateLimitConfig, RateLimiter};
use super::types::*;
use crate::core::service::ScanService;
use crate::models::config::ServerConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    AnalyzeRequest, ApiKeyRecord, ApiKeyStatus, ChainId, CreatedApiKey, StoredScan, UsageEvent,
};
use crate::utils::constants::{ANALYZE_ENDPOINT, APP_NAME, APP_VERSION};

/// Shared application state
pub struct AppState {
    pub service: Arc<ScanService>,
    pub admin_token: Option<String>,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<ScanService>, server: &ServerConfig) -> Self {
        Self {
            service,
            admin_token: server.admin_token.clone(),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::per_minute(
                server.rate_limit_per_minute,
            ))),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn require_admin(&self, headers: &HeaderMap) -> AppResult<()> {
        require_admin(self.admin_token.as_deref(), headers)
    }
}

// ============================================
// Response helpers
// ============================================

/// Error envelope with the status mapped from the error code
pub fn error_response(ctx: &RequestContext, err: AppError) -> Response {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(request_id = %ctx.request_id, code = err.code_str(), error = %err, "Request failed");
    } else {
        warn!(
            request_id = %ctx.request_id,
            code = err.code_str(),
            message = %err.message,
            "Request rejected"
        );
    }

    (status, Json(ApiResponse::failure(ApiError::from(&err), ctx))).into_response()
}

fn reply<T: Serialize>(ctx: &RequestContext, status: StatusCode, result: AppResult<T>) -> Response {
    match result {
        Ok(data) => (status, Json(ApiResponse::success(data, ctx))).into_response(),
        Err(err) => error_response(ctx, err),
    }
}

/// Empty body reads as `T::default()`
fn parse_json_body<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::invalid_input(format!("Invalid request body: {}", e)))
}

fn required_api_key(headers: &HeaderMap) -> AppResult<String> {
    extract_api_key(headers).ok_or_else(|| AppError::unauthorized("API key required."))
}

// ============================================
// Health & Meta
// ============================================

pub async fn health_check(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let data = HealthData {
        status: "ok",
        service: "rugshield",
        version: APP_VERSION,
        uptime_seconds: state.uptime_seconds(),
        time: state.service.now(),
    };
    reply(&ctx, StatusCode::OK, Ok(data))
}

pub async fn meta(Extension(ctx): Extension<RequestContext>) -> Response {
    let data = MetaData {
        name: APP_NAME,
        chain_priority: ChainId::ALL,
        default_chain: ChainId::Sui,
        version: APP_VERSION,
    };
    reply(&ctx, StatusCode::OK, Ok(data))
}

// ============================================
// Analysis
// ============================================

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = run_analyze(&state, &headers, &body).await;
    reply(&ctx, StatusCode::CREATED, result)
}

async fn run_analyze(state: &AppState, headers: &HeaderMap, body: &[u8]) -> AppResult<StoredScan> {
    let request: AnalyzeRequest = parse_json_body(body)?;
    let service = &state.service;

    let api_key: Option<ApiKeyRecord> = match extract_api_key(headers) {
        Some(token) => Some(
            service
                .authenticate_api_key(&token)
                .await?
                .ok_or_else(|| AppError::unauthorized("Invalid or inactive API key."))?,
        ),
        None => None,
    };

    if let Some(key) = &api_key {
        service.enforce_daily_quota(key).await?;
    }

    let scan = service.analyze(request).await?;

    if let Some(key) = &api_key {
        service
            .record_api_usage(UsageEvent::new(&key.id, ANALYZE_ENDPOINT).with_chain(scan.chain))
            .await?;
    }

    Ok(scan)
}

// ============================================
// Scans
// ============================================

pub async fn get_scan(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .service
        .get_scan(&id)
        .await
        .and_then(|scan| scan.ok_or_else(|| AppError::not_found("Scan not found.")));
    reply(&ctx, StatusCode::OK, result)
}

pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ScanListQuery>,
) -> Response {
    let result: AppResult<ScanListData> = async {
        let limit = parse_limit(query.limit.as_deref())?;
        let scans = state
            .service
            .list_scans(query.chain.as_deref(), query.target_value.as_deref(), limit)
            .await?;
        Ok(ScanListData { scans })
    }
    .await;
    reply(&ctx, StatusCode::OK, result)
}

// ============================================
// Self-service keys
// ============================================

pub async fn key_status(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
) -> Response {
    let result: AppResult<ApiKeyStatus> = async {
        let token = required_api_key(&headers)?;
        state.service.get_api_key_status(&token).await
    }
    .await;
    reply(&ctx, StatusCode::OK, result)
}

pub async fn rotate_key(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result: AppResult<CreatedApiKey> = async {
        let token = required_api_key(&headers)?;
        let request: RotateKeyRequest = parse_json_body(&body)?;
        state
            .service
            .rotate_api_key(&token, request.name.as_deref())
            .await
    }
    .await;
    reply(&ctx, StatusCode::CREATED, result)
}

// ============================================
// Admin
// ============================================

pub async fn admin_create_key(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result: AppResult<CreatedApiKey> = async {
        state.require_admin(&headers)?;
        let request: CreateKeyRequest = parse_json_body(&body)?;
        let tier = request.tier()?;
        state.service.create_api_key(&request.name, tier).await
    }
    .await;
    reply(&ctx, StatusCode::CREATED, result)
}

#[derive(Debug, Serialize)]
pub struct KeyListData {
    pub keys: Vec<ApiKeyRecord>,
}

pub async fn admin_list_keys(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    let result: AppResult<KeyListData> = async {
        state.require_admin(&headers)?;
        let limit = parse_limit(query.limit.as_deref())?;
        let keys = state.service.list_api_keys(limit).await?;
        Ok(KeyListData { keys })
    }
    .await;
    reply(&ctx, StatusCode::OK, result)
}

pub async fn admin_revoke_key(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result: AppResult<()> = async {
        state.require_admin(&headers)?;
        if state.service.revoke_api_key(&id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("API key not found or already revoked."))
        }
    }
    .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&ctx, err),
    }
}

pub async fn admin_usage_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Response {
    let result: AppResult<UsageReportData> = async {
        state.require_admin(&headers)?;
        let period = query.period(state.service.now())?;
        let tier = query.tier()?;
        let report = state
            .service
            .usage_summary(period.start, period.end, tier)
            .await?;
        Ok(UsageReportData { period, report })
    }
    .await;
    reply(&ctx, StatusCode::OK, result)
}

pub async fn admin_invoice_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Response {
    let result: AppResult<InvoiceData> = async {
        state.require_admin(&headers)?;
        let period = query.period(state.service.now())?;
        let invoice = state.service.invoice_report(period.start, period.end).await?;
        Ok(InvoiceData { invoice })
    }
    .await;
    reply(&ctx, StatusCode::OK, result)
}
