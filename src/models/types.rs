//! Type definitions for RugShield
//! All core data structures for the scan pipeline and API access control

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::errors::AppError;

// ============================================
// Chains & targets
// ============================================

/// Blockchain ecosystems the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    /// Sui-style (Move packages, 32-byte object ids)
    Sui,
    /// EVM-style (20-byte addresses)
    Evm,
    /// Solana-style (base58 program ids)
    Solana,
}

impl ChainId {
    /// Resolution priority, also used as the default-chain order
    pub const ALL: [ChainId; 3] = [ChainId::Sui, ChainId::Evm, ChainId::Solana];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Sui => "sui",
            ChainId::Evm => "evm",
            ChainId::Solana => "solana",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sui" => Ok(ChainId::Sui),
            "evm" => Ok(ChainId::Evm),
            "solana" => Ok(ChainId::Solana),
            other => Err(AppError::unsupported_chain(other)),
        }
    }
}

/// What the caller submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Address,
    Source,
}

// ============================================
// Findings
// ============================================

/// Finding severity, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// Finding category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    RugPullPattern,
    AccessControl,
    SupplyControl,
    Upgradeability,
    Unknown,
}

/// One deterministic rule match against an artifact's source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub category: FindingCategory,
    pub description: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Risk tier derived from the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No meaningful deterministic risk
    Safe,
    /// Low risk - minor concerns
    Low,
    /// Medium risk - review recommended
    Medium,
    /// High risk - likely dangerous controls present
    High,
    /// Critical - multiple severe rug patterns
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "✅",
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
        }
    }
}

// ============================================
// Artifacts & reports
// ============================================

/// Retrieval metadata for an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Compiler / ecosystem tag (e.g. "sui-move", "solidity", "rust/svm")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    /// Source came from a verified on-chain / explorer record
    pub verified_source: bool,
    pub fetched_at: DateTime<Utc>,
    /// False when the provider could not be reached after retries
    pub provider_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_mode_reason: Option<String>,
    pub retry_attempts: u32,
}

/// Retrieved (or placeholder) source representation of a target
#[derive(Debug, Clone, PartialEq)]
pub struct ChainAnalysisArtifact {
    pub chain: ChainId,
    /// Target exactly as submitted
    pub target_value: String,
    pub normalized_target: String,
    pub source_code: String,
    pub metadata: ArtifactMetadata,
}

/// Artifact metadata carried onto the report so degraded scans are visible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProvenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    pub verified_source: bool,
    pub provider_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_mode_reason: Option<String>,
    pub retry_attempts: u32,
}

impl From<&ArtifactMetadata> for ScanProvenance {
    fn from(meta: &ArtifactMetadata) -> Self {
        Self {
            compiler: meta.compiler.clone(),
            verified_source: meta.verified_source,
            provider_healthy: meta.provider_healthy,
            degraded_mode_reason: meta.degraded_mode_reason.clone(),
            retry_attempts: meta.retry_attempts,
        }
    }
}

/// Output of one analyze call before persistence
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub chain: ChainId,
    pub target_type: TargetType,
    pub target_value: String,
    pub score: u8,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub findings: Vec<VulnerabilityFinding>,
    pub engine: String,
    pub analysis_time_ms: u64,
    pub provenance: ScanProvenance,
    pub created_at: DateTime<Utc>,
}

/// Scan row handed to the repository
#[derive(Debug, Clone)]
pub struct NewScan {
    pub report: SecurityReport,
    pub source_code_hash: Option<String>,
}

/// Persisted, auditable scan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredScan {
    pub id: String,
    pub chain: ChainId,
    pub target_type: TargetType,
    pub target_value: String,
    pub score: u8,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub findings: Vec<VulnerabilityFinding>,
    pub engine: String,
    pub analysis_time_ms: u64,
    pub provenance: ScanProvenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter for scan listing
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub chain: Option<ChainId>,
    pub target_value: Option<String>,
    pub limit: Option<usize>,
}

/// Analyze request as accepted by the service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Explicit chain hint; detected from the target when absent
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default, alias = "targetType")]
    pub target_type: TargetType,
    #[serde(default, alias = "targetValue")]
    pub target_value: String,
    /// Raw source overriding whatever the analyzer fetched
    #[serde(default, alias = "sourceCode")]
    pub source_code: Option<String>,
}

// ============================================
// API keys & usage
// ============================================

/// Billing / quota class of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyTier {
    Free,
    Pro,
    Api,
}

impl ApiKeyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyTier::Free => "free",
            ApiKeyTier::Pro => "pro",
            ApiKeyTier::Api => "api",
        }
    }
}

impl fmt::Display for ApiKeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiKeyTier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "free" => Ok(ApiKeyTier::Free),
            "pro" => Ok(ApiKeyTier::Pro),
            "api" => Ok(ApiKeyTier::Api),
            _ => Err(AppError::invalid_input("tier must be one of: free, pro, api.")),
        }
    }
}

/// Key row handed to the repository (hash only, never the token)
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub tier: ApiKeyTier,
    pub key_hash: String,
    pub key_prefix: String,
}

/// Persisted API key (no secret material)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub name: String,
    pub tier: ApiKeyTier,
    pub key_prefix: String,
    pub active: bool,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Freshly issued key; the only place the plaintext token ever appears
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub record: ApiKeyRecord,
    pub token: String,
}

/// Self-service view of a key's daily quota
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyStatus {
    pub key: ApiKeyRecord,
    pub quota: u64,
    pub used_today: u64,
    pub remaining_today: u64,
}

/// One metered request
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub api_key_id: String,
    pub endpoint: String,
    pub chain: Option<ChainId>,
    pub request_units: u64,
}

impl UsageEvent {
    /// Single-unit event
    pub fn new(api_key_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key_id: api_key_id.into(),
            endpoint: endpoint.into(),
            chain: None,
            request_units: 1,
        }
    }

    pub fn with_chain(mut self, chain: ChainId) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_units(mut self, units: u64) -> Self {
        self.request_units = units;
        self
    }
}

/// Usage event joined with its key, as read back for reporting
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummaryRow {
    pub api_key_id: String,
    pub key_name: String,
    pub key_prefix: String,
    pub tier: ApiKeyTier,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainId>,
    pub request_units: u64,
    pub created_at: DateTime<Utc>,
}

/// Units summed per (key, endpoint)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageAggregate {
    pub api_key_id: String,
    pub key_name: String,
    pub key_prefix: String,
    pub tier: ApiKeyTier,
    pub endpoint: String,
    pub total_units: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLineItem {
    pub api_key_id: String,
    pub key_name: String,
    pub key_prefix: String,
    pub tier: ApiKeyTier,
    pub endpoint: String,
    pub billable_units: u64,
    pub unit_price_usd: f64,
    pub amount_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceReport {
    pub currency: &'static str,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_amount_usd: f64,
    pub line_items: Vec<InvoiceLineItem>,
}

/// Half-open reporting window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::invalid_input(
                "Invalid report period. Provide ISO dates with start < end.",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_chain_parsing() {
        assert_eq!("sui".parse::<ChainId>().unwrap(), ChainId::Sui);
        assert_eq!("evm".parse::<ChainId>().unwrap(), ChainId::Evm);
        assert_eq!("solana".parse::<ChainId>().unwrap(), ChainId::Solana);

        let err = "base".parse::<ChainId>().unwrap_err();
        assert!(err.message.contains("Unsupported chain"));
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("api".parse::<ApiKeyTier>().unwrap(), ApiKeyTier::Api);
        assert!("enterprise".parse::<ApiKeyTier>().is_err());
    }

    #[test]
    fn test_report_period_is_half_open() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let period = ReportPeriod::new(start, end).unwrap();

        assert!(period.contains(start));
        assert!(!period.contains(end));
        assert!(ReportPeriod::new(end, start).is_err());
        assert!(ReportPeriod::new(start, start).is_err());
    }

    #[test]
    fn test_created_key_serializes_flat() {
        let created = CreatedApiKey {
            record: ApiKeyRecord {
                id: "key_1".to_string(),
                name: "ci".to_string(),
                tier: ApiKeyTier::Pro,
                key_prefix: "rgs_pro_0123456".to_string(),
                active: true,
                usage_count: 0,
                last_used_at: None,
                created_at: Utc::now(),
            },
            token: "rgs_pro_0123456789".to_string(),
        };

        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["tier"], "pro");
        assert_eq!(json["token"], "rgs_pro_0123456789");
        assert_eq!(json["key_prefix"], "rgs_pro_0123456");
    }
}
