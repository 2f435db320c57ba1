//! Constants Module - Single Source of Truth
//!
//! Every default, endpoint and tunable used across the crate lives here.
//! Other modules read these instead of hardcoding values.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "RugShield";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound RPC and explorer requests
pub const USER_AGENT: &str = concat!("RugShield/", env!("CARGO_PKG_VERSION"));

/// Engine tag stamped on every report
pub const ENGINE_TAG: &str = "deterministic-rules-v1";

// ============================================
// PROVIDER ENDPOINTS
// ============================================

/// Public Sui fullnode
pub const DEFAULT_SUI_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";

/// Etherscan-compatible explorer API
pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";

/// Public Solana mainnet RPC
pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Solana upgradeable BPF loader program id
pub const BPF_LOADER_UPGRADEABLE: &str = "BPFLoaderUpgradeab1e11111111111111111111111";

/// SPL token program ids (classic and token-2022)
pub const SPL_TOKEN_PROGRAMS: [&str; 2] = [
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
    "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",
];

// ============================================
// RETRY DEFAULTS
// ============================================

/// Attempts per provider lookup
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base delay; attempt `n` waits `n * base` before the next one
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Per-attempt timeout
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 4_000;

// ============================================
// ACCESS & BILLING DEFAULTS
// ============================================

/// Bearer token prefix; full token is `rgs_<tier>_<hex>`
pub const TOKEN_PREFIX: &str = "rgs";

/// Random bytes per token (hex-encoded to 48 chars)
pub const TOKEN_RANDOM_BYTES: usize = 24;

/// Stored visible prefix length
pub const KEY_PREFIX_LEN: usize = 16;

pub const DEFAULT_FREE_DAILY_LIMIT: u64 = 100;
pub const DEFAULT_PRO_DAILY_LIMIT: u64 = 5_000;
pub const DEFAULT_API_DAILY_LIMIT: u64 = 100_000;

/// USD per billable unit for the `api` tier
pub const DEFAULT_UNIT_PRICE_USD: f64 = 0.05;

/// Invoice currency
pub const INVOICE_CURRENCY: &str = "USD";

/// Default page sizes
pub const DEFAULT_SCAN_LIST_LIMIT: usize = 20;
pub const DEFAULT_KEY_LIST_LIMIT: usize = 100;

/// Report window when the caller gives no start
pub const DEFAULT_REPORT_WINDOW_DAYS: i64 = 30;

/// Endpoint label recorded for metered analyze calls
pub const ANALYZE_ENDPOINT: &str = "/api/v1/analyze";

// ============================================
// SERVER DEFAULTS
// ============================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Fixed-window requests per minute per caller
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;

// ============================================
// HELPERS
// ============================================

/// Parse an env var, falling back to `default` when unset or malformed
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Non-empty env string
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Round a USD amount to 4 decimals
#[inline]
pub fn round_usd(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_usd() {
        assert_eq!(round_usd(0.15000000000000002), 0.15);
        assert_eq!(round_usd(1.23456), 1.2346);
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("RUGSHIELD_TEST_UNSET_VAR", 7u32), 7);
    }
}
