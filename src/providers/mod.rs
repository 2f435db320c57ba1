//! Providers Module - Chain analyzers and target resolution
//!
//! One analyzer per chain family. Each one validates and normalizes targets
//! and turns an upstream lookup into a `ChainAnalysisArtifact`. Lookup
//! failures never fail the pipeline: after the retry budget is spent the
//! analyzer hands back its placeholder source flagged as degraded.

pub mod evm;
pub mod rpc;
pub mod solana;
pub mod sui;

pub use evm::EvmAnalyzer;
pub use rpc::*;
pub use solana::SolanaAnalyzer;
pub use sui::SuiAnalyzer;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::config::ProviderConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ArtifactMetadata, ChainAnalysisArtifact, ChainId};
use crate::utils::clock::Clock;
use crate::utils::retry::{run_with_retry, RetryOptions};

lazy_static! {
    static ref SUI_OBJECT_ID: Regex = Regex::new(r"(?i)^0x[0-9a-f]{64}$").expect("valid regex");
    static ref EVM_ADDRESS: Regex = Regex::new(r"(?i)^0x[0-9a-f]{40}$").expect("valid regex");
    static ref BASE58_ID: Regex =
        Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex");
}

/// Guess the chain from the shape of the target; Sui when nothing matches
pub fn detect_chain(target: &str) -> ChainId {
    let value = target.trim();
    if SUI_OBJECT_ID.is_match(value) {
        ChainId::Sui
    } else if EVM_ADDRESS.is_match(value) {
        ChainId::Evm
    } else if BASE58_ID.is_match(value) {
        ChainId::Solana
    } else {
        ChainId::Sui
    }
}

/// Explicit hint wins; otherwise detect from the target
pub fn resolve_chain(target: &str, hint: Option<&str>) -> AppResult<ChainId> {
    match hint {
        Some(hint) => hint.parse(),
        None => Ok(detect_chain(target)),
    }
}

/// Shape check shared by the Solana analyzer
pub(crate) fn is_base58_id(value: &str) -> bool {
    BASE58_ID.is_match(value)
}

/// Source text recovered by a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSource {
    pub source_code: String,
    /// Overrides the analyzer's default compiler tag
    pub compiler: Option<String>,
    /// Came from a verified record rather than derived metadata
    pub verified: bool,
}

#[async_trait]
pub trait ChainAnalyzer: Send + Sync {
    fn chain(&self) -> ChainId;

    /// Compiler / ecosystem tag used when the lookup does not report one
    fn compiler(&self) -> &'static str;

    fn normalize_target(&self, target: &str) -> String;

    fn is_valid_target(&self, target: &str) -> bool;

    /// Deterministic stand-in when no source can be retrieved
    fn placeholder_source(&self, normalized: &str) -> String;

    fn retry_options(&self) -> &RetryOptions;

    /// Offline analyzers skip the network entirely
    fn lookups_enabled(&self) -> bool {
        true
    }

    /// One lookup attempt. `Ok(None)` means the provider answered but has no source.
    async fn lookup_source(&self, normalized: &str) -> eyre::Result<Option<FetchedSource>>;

    /// Retrieve an artifact, degrading to the placeholder on provider failure.
    /// `fetched_at` is read from `clock`.
    async fn fetch_artifact(&self, target: &str, clock: &dyn Clock) -> ChainAnalysisArtifact {
        let chain = self.chain();
        let normalized = self.normalize_target(target);

        let mut metadata = ArtifactMetadata {
            compiler: Some(self.compiler().to_string()),
            verified_source: false,
            fetched_at: clock.now(),
            provider_healthy: true,
            degraded_mode_reason: None,
            retry_attempts: 0,
        };

        if !self.lookups_enabled() {
            debug!(%chain, target = %normalized, "Lookups disabled, using placeholder source");
            return ChainAnalysisArtifact {
                chain,
                target_value: target.to_string(),
                source_code: self.placeholder_source(&normalized),
                normalized_target: normalized,
                metadata,
            };
        }

        let label = format!("{} lookup", chain);
        let outcome =
            run_with_retry(&label, self.retry_options(), || self.lookup_source(&normalized)).await;
        metadata.retry_attempts = outcome.attempts;
        metadata.fetched_at = clock.now();

        let source_code = match outcome.result {
            Ok(Some(fetched)) => {
                info!(
                    %chain,
                    target = %normalized,
                    verified = fetched.verified,
                    attempts = outcome.attempts,
                    "✅ Source retrieved"
                );
                if let Some(compiler) = fetched.compiler {
                    metadata.compiler = Some(compiler);
                }
                metadata.verified_source = fetched.verified;
                fetched.source_code
            }
            Ok(None) => {
                debug!(%chain, target = %normalized, "No source published, using placeholder");
                self.placeholder_source(&normalized)
            }
            Err(e) => {
                warn!(
                    %chain,
                    target = %normalized,
                    attempts = outcome.attempts,
                    error = %e,
                    "🔄 Provider unavailable, falling back to placeholder source"
                );
                metadata.provider_healthy = false;
                metadata.degraded_mode_reason = Some(e.to_string());
                self.placeholder_source(&normalized)
            }
        };

        ChainAnalysisArtifact {
            chain,
            target_value: target.to_string(),
            normalized_target: normalized,
            source_code,
            metadata,
        }
    }
}

/// Chain -> analyzer lookup table
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<ChainId, Arc<dyn ChainAnalyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sui, EVM and Solana analyzers built from provider config
    pub fn from_config(config: &ProviderConfig) -> eyre::Result<Self> {
        let client = build_http_client()?;

        let registry = Self::new()
            .with_analyzer(Arc::new(SuiAnalyzer::new(config, client.clone())))
            .with_analyzer(Arc::new(EvmAnalyzer::new(config, client.clone())))
            .with_analyzer(Arc::new(SolanaAnalyzer::new(config, client)));

        info!(
            lookups_enabled = config.lookups_enabled,
            attempts = config.retry.attempts,
            "✅ Chain analyzers initialized (sui, evm, solana)"
        );
        Ok(registry)
    }

    /// Register or replace the analyzer for its chain
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ChainAnalyzer>) -> Self {
        self.analyzers.insert(analyzer.chain(), analyzer);
        self
    }

    pub fn get(&self, chain: ChainId) -> AppResult<Arc<dyn ChainAnalyzer>> {
        self.analyzers
            .get(&chain)
            .cloned()
            .ok_or_else(|| AppError::unsupported_chain(chain.as_str()))
    }

    pub fn is_supported(&self, chain: ChainId) -> bool {
        self.analyzers.contains_key(&chain)
    }
}
