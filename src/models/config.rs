//! Configuration module for RugShield
//!
//! Env is read once at bootstrap (`from_env`) and the resulting structs are
//! passed explicitly into the service and the HTTP layer.

use std::time::Duration;
use tracing::info;

use crate::models::types::ApiKeyTier;
use crate::utils::constants::{
    env_or, env_string, DEFAULT_API_DAILY_LIMIT, DEFAULT_ETHERSCAN_API_URL,
    DEFAULT_FREE_DAILY_LIMIT, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PROVIDER_TIMEOUT_MS,
    DEFAULT_PRO_DAILY_LIMIT, DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_SOLANA_RPC_URL, DEFAULT_SUI_RPC_URL,
    DEFAULT_UNIT_PRICE_USD, TOKEN_PREFIX,
};
use crate::utils::retry::RetryOptions;

/// Daily request-unit limits per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    pub free: u64,
    pub pro: u64,
    pub api: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free: DEFAULT_FREE_DAILY_LIMIT,
            pro: DEFAULT_PRO_DAILY_LIMIT,
            api: DEFAULT_API_DAILY_LIMIT,
        }
    }
}

impl QuotaConfig {
    pub fn from_env() -> Self {
        Self {
            free: env_or("FREE_TIER_DAILY_LIMIT", DEFAULT_FREE_DAILY_LIMIT),
            pro: env_or("PRO_TIER_DAILY_LIMIT", DEFAULT_PRO_DAILY_LIMIT),
            api: env_or("API_TIER_DAILY_LIMIT", DEFAULT_API_DAILY_LIMIT),
        }
    }

    #[inline]
    pub fn for_tier(&self, tier: ApiKeyTier) -> u64 {
        match tier {
            ApiKeyTier::Free => self.free,
            ApiKeyTier::Pro => self.pro,
            ApiKeyTier::Api => self.api,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingConfig {
    /// USD per billable unit
    pub unit_price_usd: f64,
    /// Only this tier appears on invoices
    pub billable_tier: ApiKeyTier,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            unit_price_usd: DEFAULT_UNIT_PRICE_USD,
            billable_tier: ApiKeyTier::Api,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Self {
        let unit_price_usd = env_or("API_SCAN_UNIT_PRICE_USD", DEFAULT_UNIT_PRICE_USD);
        Self {
            unit_price_usd: if unit_price_usd.is_finite() && unit_price_usd >= 0.0 {
                unit_price_usd
            } else {
                DEFAULT_UNIT_PRICE_USD
            },
            ..Self::default()
        }
    }
}

/// Upstream chain endpoints and lookup behaviour
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub sui_rpc_url: String,
    pub etherscan_api_url: String,
    /// Never logged
    pub etherscan_api_key: Option<String>,
    pub solana_rpc_url: String,
    pub retry: RetryOptions,
    /// When false every analyzer answers with its placeholder (offline mode)
    pub lookups_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sui_rpc_url: DEFAULT_SUI_RPC_URL.to_string(),
            etherscan_api_url: DEFAULT_ETHERSCAN_API_URL.to_string(),
            etherscan_api_key: None,
            solana_rpc_url: DEFAULT_SOLANA_RPC_URL.to_string(),
            retry: RetryOptions::default(),
            lookups_enabled: true,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let etherscan_api_key = env_string("ETHERSCAN_API_KEY");
        if etherscan_api_key.is_some() {
            info!("🔑 ETHERSCAN_API_KEY configured (key hidden)");
        }

        let attempts: u32 = env_or("PROVIDER_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS);
        let retry = RetryOptions {
            attempts: if attempts == 0 { DEFAULT_RETRY_ATTEMPTS } else { attempts },
            base_delay: Duration::from_millis(env_or(
                "PROVIDER_RETRY_DELAY_MS",
                DEFAULT_RETRY_DELAY_MS,
            )),
            timeout: Duration::from_millis(env_or(
                "PROVIDER_TIMEOUT_MS",
                DEFAULT_PROVIDER_TIMEOUT_MS,
            )),
        };

        Self {
            sui_rpc_url: env_string("SUI_RPC_URL")
                .unwrap_or_else(|| DEFAULT_SUI_RPC_URL.to_string()),
            etherscan_api_url: env_string("ETHERSCAN_API_URL")
                .unwrap_or_else(|| DEFAULT_ETHERSCAN_API_URL.to_string()),
            etherscan_api_key,
            solana_rpc_url: env_string("SOLANA_RPC_URL")
                .unwrap_or_else(|| DEFAULT_SOLANA_RPC_URL.to_string()),
            retry,
            lookups_enabled: env_or("PROVIDER_LOOKUPS_ENABLED", true),
        }
    }

    /// Offline configuration: no network, placeholders only
    pub fn offline() -> Self {
        Self {
            lookups_enabled: false,
            ..Self::default()
        }
    }
}

/// Everything the scan service needs
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub quotas: QuotaConfig,
    pub billing: BillingConfig,
    pub providers: ProviderConfig,
    /// Leading segment of issued tokens
    pub token_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            quotas: QuotaConfig::default(),
            billing: BillingConfig::default(),
            providers: ProviderConfig::default(),
            token_prefix: TOKEN_PREFIX.to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            quotas: QuotaConfig::from_env(),
            billing: BillingConfig::from_env(),
            providers: ProviderConfig::from_env(),
            token_prefix: TOKEN_PREFIX.to_string(),
        }
    }

    /// Default limits with provider lookups disabled
    pub fn offline() -> Self {
        Self {
            providers: ProviderConfig::offline(),
            ..Self::default()
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `x-admin-token` must equal this; `None` rejects every admin call
    pub admin_token: Option<String>,
    pub rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            admin_token: None,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env_string("PORT")
            .or_else(|| env_string("RUGSHIELD_PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            host: env_string("RUGSHIELD_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            admin_token: env_string("INTERNAL_ADMIN_TOKEN"),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", DEFAULT_RATE_LIMIT_PER_MINUTE),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
