//! API Request/Response Types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{
    ApiKeyTier, ChainId, InvoiceReport, ReportPeriod, StoredScan, UsageAggregate,
};
use crate::utils::constants::DEFAULT_REPORT_WINDOW_DAYS;

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, ctx: &RequestContext) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms: ctx.latency_ms(),
            timestamp: Utc::now().timestamp(),
            request_id: ctx.request_id.clone(),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: ApiError, ctx: &RequestContext) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms: ctx.latency_ms(),
            timestamp: Utc::now().timestamp(),
            request_id: ctx.request_id.clone(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        let details = match err.code {
            ErrorCode::QuotaExceeded => err
                .quota
                .map(|q| format!("tier: {}, used: {}, quota: {}", q.tier, q.used, q.quota)),
            _ => None,
        };

        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details,
        }
    }
}

/// Per-request context set by the request-id middleware
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub started: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            started: Instant::now(),
        }
    }

    pub fn latency_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

// ============================================
// Key Administration
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateKeyRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tier: Option<String>,
}

impl CreateKeyRequest {
    pub fn tier(&self) -> AppResult<ApiKeyTier> {
        self.tier
            .as_deref()
            .unwrap_or_default()
            .parse()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RotateKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

// ============================================
// Scan Listing
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct ScanListQuery {
    pub chain: Option<String>,
    #[serde(alias = "targetValue")]
    pub target_value: Option<String>,
    pub limit: Option<String>,
}

/// Optional positive integer query value
pub fn parse_limit(raw: Option<&str>) -> AppResult<Option<usize>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| AppError::invalid_input("limit must be a positive integer.")),
    }
}

// ============================================
// Reports
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub tier: Option<String>,
}

const INVALID_PERIOD: &str = "Invalid report period. Provide ISO dates with start < end.";

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC)
fn parse_instant(raw: &str) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| AppError::invalid_input(INVALID_PERIOD))
}

impl ReportQuery {
    /// end defaults to `now`, start to 30 days before end
    pub fn period(&self, now: DateTime<Utc>) -> AppResult<ReportPeriod> {
        let end = match self.end.as_deref() {
            Some(raw) => parse_instant(raw)?,
            None => now,
        };
        let start = match self.start.as_deref() {
            Some(raw) => parse_instant(raw)?,
            None => end - chrono::Duration::days(DEFAULT_REPORT_WINDOW_DAYS),
        };
        ReportPeriod::new(start, end)
    }

    pub fn tier(&self) -> AppResult<Option<ApiKeyTier>> {
        self.tier.as_deref().map(str::parse).transpose()
    }
}

// ============================================
// Response payloads
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MetaData {
    pub name: &'static str,
    pub chain_priority: [ChainId; 3],
    pub default_chain: ChainId,
    pub version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanListData {
    pub scans: Vec<StoredScan>,
}

#[derive(Debug, Serialize)]
pub struct UsageReportData {
    pub period: ReportPeriod,
    pub report: Vec<UsageAggregate>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceData {
    pub invoice: InvoiceReport,
}
