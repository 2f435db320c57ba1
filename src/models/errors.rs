//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so logs and API clients can
//! tell a bad request from an exhausted quota without parsing messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - INPUT_xxx: request validation errors
//! - CHAIN_xxx: chain resolution errors
//! - AUTH_xxx: API key / admin credential errors
//! - QUOTA_xxx: metering errors
//! - PROVIDER_xxx: upstream RPC / explorer errors
//! - STORE_xxx: persistence errors

use std::fmt;

use crate::models::types::ApiKeyTier;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Quota counters, set only for `QuotaExceeded`
    pub quota: Option<QuotaSnapshot>,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Usage counters attached to a quota failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub tier: ApiKeyTier,
    pub used: u64,
    pub quota: u64,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            quota: None,
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            quota: None,
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Input Errors
    // ============================================
    /// Missing or malformed request field, bad tier, bad report period
    InvalidInput,
    /// Chain hint outside the supported set
    UnsupportedChain,
    /// Target does not match the chain's identifier format
    InvalidTarget,

    // ============================================
    // Access Errors
    // ============================================
    /// Missing, unknown or inactive API key
    Unauthorized,
    /// Admin credential missing or wrong
    Forbidden,
    /// Daily quota for the key's tier is used up
    QuotaExceeded,
    /// Transport-level rate limit
    RateLimited,
    /// Key administration requested but no access repository is wired in
    AccessNotConfigured,

    // ============================================
    // Provider Errors
    // ============================================
    /// Chain RPC / explorer unreachable after retries
    ProviderUnavailable,
    /// Provider call exceeded its per-attempt timeout
    ProviderTimeout,
    /// Provider answered with something we could not decode
    ProviderInvalidResponse,

    // ============================================
    // Persistence Errors
    // ============================================
    /// Repository operation failed
    PersistenceFailed,
    /// Resource not found
    NotFound,

    // ============================================
    // Generic Errors
    // ============================================
    /// Internal server error
    Internal,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INPUT_INVALID",
            Self::UnsupportedChain => "CHAIN_UNSUPPORTED",
            Self::InvalidTarget => "CHAIN_INVALID_TARGET",

            Self::Unauthorized => "AUTH_INVALID_KEY",
            Self::Forbidden => "AUTH_FORBIDDEN",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::RateLimited => "QUOTA_RATE_LIMITED",
            Self::AccessNotConfigured => "AUTH_NOT_CONFIGURED",

            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::ProviderInvalidResponse => "PROVIDER_INVALID_RESPONSE",

            Self::PersistenceFailed => "STORE_FAILED",
            Self::NotFound => "STORE_NOT_FOUND",

            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput | Self::UnsupportedChain | Self::InvalidTarget => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::QuotaExceeded | Self::RateLimited => 429,
            Self::AccessNotConfigured | Self::ProviderUnavailable => 503,
            Self::ProviderTimeout => 504,
            _ => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable | Self::ProviderTimeout | Self::ProviderInvalidResponse
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Missing or malformed input
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    /// Chain hint outside the supported set
    pub fn unsupported_chain(value: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedChain,
            format!("Unsupported chain '{}'. Expected sui, evm, or solana.", value),
        )
    }

    /// Target failed the chain's format check
    pub fn invalid_target(chain: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidTarget,
            format!("Invalid {} target format.", chain),
        )
    }

    /// Invalid or inactive API key
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, msg)
    }

    /// Admin credential rejected
    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "Forbidden.")
    }

    /// Daily quota exhausted
    pub fn quota_exceeded(tier: ApiKeyTier, used: u64, quota: u64) -> Self {
        let mut err = Self::new(
            ErrorCode::QuotaExceeded,
            format!(
                "Daily quota exceeded for tier '{}' ({}/{}).",
                tier, used, quota
            ),
        );
        err.quota = Some(QuotaSnapshot { tier, used, quota });
        err
    }

    /// Transport rate limit hit
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::RateLimited,
            format!("Rate limit exceeded. Retry after {} seconds", retry_after_secs),
        )
    }

    /// Access repository missing
    pub fn access_not_configured() -> Self {
        Self::new(
            ErrorCode::AccessNotConfigured,
            "Access management is not configured.",
        )
    }

    /// Upstream provider unreachable
    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnavailable, msg)
    }

    /// Resource not found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    /// Repository failure
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceFailed, msg)
    }

    /// Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ProviderTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ProviderUnavailable, "Connection failed")
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ProviderInvalidResponse, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::invalid_target("evm");
        assert_eq!(err.code, ErrorCode::InvalidTarget);
        assert_eq!(err.code_str(), "CHAIN_INVALID_TARGET");
        assert_eq!(err.message, "Invalid evm target format.");
    }

    #[test]
    fn test_quota_error_carries_counts() {
        let err = AppError::quota_exceeded(ApiKeyTier::Free, 2, 2);
        assert_eq!(err.code, ErrorCode::QuotaExceeded);
        let snapshot = err.quota.expect("quota snapshot");
        assert_eq!((snapshot.used, snapshot.quota), (2, 2));
        assert!(err.message.contains("Daily quota exceeded for tier 'free' (2/2)."));
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::ProviderUnavailable.is_retryable());
        assert!(ErrorCode::ProviderTimeout.is_retryable());
        assert!(!ErrorCode::QuotaExceeded.is_retryable());
        assert!(!ErrorCode::InvalidInput.is_retryable());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::InvalidInput.http_status(), 400);
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::Forbidden.http_status(), 403);
        assert_eq!(ErrorCode::QuotaExceeded.http_status(), 429);
        assert_eq!(ErrorCode::PersistenceFailed.http_status(), 500);
    }
}
