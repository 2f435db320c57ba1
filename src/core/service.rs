//! Scan Service
//!
//! Orchestrates the pipeline (chain resolution -> artifact retrieval ->
//! rule evaluation -> scoring -> persistence) and owns API key lifecycle,
//! daily quotas, usage metering and billing reports.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::repository::{AccessRepository, ScanRepository};
use super::risk_score::build_security_report;
use super::rules::detect_findings;
use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    AnalyzeRequest, ApiKeyRecord, ApiKeyStatus, ApiKeyTier, ChainId, CreatedApiKey,
    InvoiceLineItem, InvoiceReport, NewApiKey, NewScan, ReportPeriod, ScanFilter, StoredScan,
    UsageAggregate, UsageEvent,
};
use crate::providers::{resolve_chain, AnalyzerRegistry};
use crate::utils::clock::{start_of_utc_day, Clock, SystemClock};
use crate::utils::constants::{
    round_usd, DEFAULT_KEY_LIST_LIMIT, DEFAULT_SCAN_LIST_LIMIT, INVOICE_CURRENCY,
};
use crate::utils::hashing::{generate_api_token, hash_api_token, hash_source, token_prefix};

pub struct ScanService {
    scans: Arc<dyn ScanRepository>,
    access: Option<Arc<dyn AccessRepository>>,
    analyzers: AnalyzerRegistry,
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
}

impl ScanService {
    pub fn new(
        scans: Arc<dyn ScanRepository>,
        access: Option<Arc<dyn AccessRepository>>,
        analyzers: AnalyzerRegistry,
        config: ServiceConfig,
    ) -> Self {
        Self {
            scans,
            access,
            analyzers,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source (quota windows, report timestamps)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn access(&self) -> AppResult<&Arc<dyn AccessRepository>> {
        self.access.as_ref().ok_or_else(AppError::access_not_configured)
    }

    // ============================================
    // SCAN PIPELINE
    // ============================================

    /// Run the full pipeline for one target and persist the result
    pub async fn analyze(&self, request: AnalyzeRequest) -> AppResult<StoredScan> {
        if request.target_value.trim().is_empty() {
            return Err(AppError::invalid_input("targetValue is required."));
        }

        let hint = request.chain.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let chain = resolve_chain(&request.target_value, hint)?;
        let analyzer = self.analyzers.get(chain)?;

        if !analyzer.is_valid_target(&request.target_value) {
            return Err(AppError::invalid_target(chain));
        }

        let started = Instant::now();
        let mut artifact = analyzer
            .fetch_artifact(&request.target_value, self.clock.as_ref())
            .await;

        if let Some(source) = request.source_code.filter(|s| !s.trim().is_empty()) {
            debug!(%chain, bytes = source.len(), "Caller-supplied source overrides artifact");
            artifact.source_code = source;
        }

        let findings = detect_findings(&artifact);
        let report = build_security_report(
            &artifact,
            request.target_type,
            findings,
            started.elapsed().as_millis() as u64,
            self.clock.now(),
        );
        let source_code_hash = Some(hash_source(&artifact.source_code));

        let stored = self
            .scans
            .create_scan(NewScan {
                report,
                source_code_hash,
            })
            .await?;

        info!(
            scan_id = %stored.id,
            %chain,
            target = %artifact.normalized_target,
            score = stored.score,
            risk = %stored.risk_level.as_str(),
            findings = stored.findings.len(),
            provider_healthy = stored.provenance.provider_healthy,
            "{} Scan completed",
            stored.risk_level.emoji()
        );

        Ok(stored)
    }

    pub async fn get_scan(&self, id: &str) -> AppResult<Option<StoredScan>> {
        self.scans.get_scan_by_id(id).await
    }

    /// Newest first; `chain` uses the same parsing as analyze hints
    pub async fn list_scans(
        &self,
        chain: Option<&str>,
        target_value: Option<&str>,
        limit: Option<usize>,
    ) -> AppResult<Vec<StoredScan>> {
        let chain = chain.map(str::parse::<ChainId>).transpose()?;
        self.scans
            .list_scans(&ScanFilter {
                chain,
                target_value: target_value.map(str::to_string),
                limit: Some(limit.unwrap_or(DEFAULT_SCAN_LIST_LIMIT)),
            })
            .await
    }

    // ============================================
    // API KEY LIFECYCLE
    // ============================================

    fn issue_key(&self, name: &str, tier: ApiKeyTier) -> AppResult<(String, NewApiKey)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_input("API key name is required."));
        }

        let token = generate_api_token(&self.config.token_prefix, tier);
        let key = NewApiKey {
            name: name.to_string(),
            tier,
            key_hash: hash_api_token(&token),
            key_prefix: token_prefix(&token),
        };
        Ok((token, key))
    }

    /// Issue a new key; the token is returned once and never stored
    pub async fn create_api_key(&self, name: &str, tier: ApiKeyTier) -> AppResult<CreatedApiKey> {
        let access = self.access()?;
        let (token, key) = self.issue_key(name, tier)?;
        let record = access.create_api_key(key).await?;
        Ok(CreatedApiKey { record, token })
    }

    /// Active key for a presented token; `None` for empty, unknown or revoked tokens
    pub async fn authenticate_api_key(&self, token: &str) -> AppResult<Option<ApiKeyRecord>> {
        let Some(access) = self.access.as_ref() else {
            return Ok(None);
        };

        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        access.find_active_api_key_by_hash(&hash_api_token(token)).await
    }

    async fn require_key(&self, token: &str) -> AppResult<ApiKeyRecord> {
        self.authenticate_api_key(token)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid or inactive API key."))
    }

    /// Swap a key for a fresh one of the same tier and retire the old one
    pub async fn rotate_api_key(
        &self,
        current_token: &str,
        next_name: Option<&str>,
    ) -> AppResult<CreatedApiKey> {
        let access = self.access()?;
        let current = self.require_key(current_token).await?;

        let name = next_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-rotated", current.name));

        let (token, key) = self.issue_key(&name, current.tier)?;
        let record = access.replace_api_key(&current.id, key).await?;

        info!(old_key_id = %current.id, new_key_id = %record.id, "🔄 API key rotated");
        Ok(CreatedApiKey { record, token })
    }

    pub async fn revoke_api_key(&self, id: &str) -> AppResult<bool> {
        self.access()?.revoke_api_key(id).await
    }

    /// Newest first, 100 by default
    pub async fn list_api_keys(&self, limit: Option<usize>) -> AppResult<Vec<ApiKeyRecord>> {
        self.access()?
            .list_api_keys(Some(limit.unwrap_or(DEFAULT_KEY_LIST_LIMIT)))
            .await
    }

    /// Quota view for the caller's own key
    pub async fn get_api_key_status(&self, token: &str) -> AppResult<ApiKeyStatus> {
        let key = self.require_key(token).await?;
        let quota = self.quota_for_tier(key.tier);
        let used_today = self.daily_usage_count(&key.id).await?;

        Ok(ApiKeyStatus {
            key,
            quota,
            used_today,
            remaining_today: quota.saturating_sub(used_today),
        })
    }

    // ============================================
    // QUOTA & METERING
    // ============================================

    pub fn quota_for_tier(&self, tier: ApiKeyTier) -> u64 {
        self.config.quotas.for_tier(tier)
    }

    /// Units used since midnight UTC
    pub async fn daily_usage_count(&self, api_key_id: &str) -> AppResult<u64> {
        self.daily_usage_count_at(api_key_id, self.clock.now()).await
    }

    pub async fn daily_usage_count_at(
        &self,
        api_key_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        match self.access.as_ref() {
            Some(access) => {
                access
                    .count_api_usage_since(api_key_id, start_of_utc_day(now))
                    .await
            }
            None => Ok(0),
        }
    }

    /// Fails with `QuotaExceeded` once today's usage reaches the tier limit.
    ///
    /// Check-then-act: concurrent requests can overshoot the limit slightly.
    pub async fn enforce_daily_quota(&self, key: &ApiKeyRecord) -> AppResult<()> {
        self.enforce_daily_quota_at(key, self.clock.now()).await
    }

    pub async fn enforce_daily_quota_at(
        &self,
        key: &ApiKeyRecord,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.access.is_none() {
            return Ok(());
        }

        let used = self.daily_usage_count_at(&key.id, now).await?;
        let quota = self.quota_for_tier(key.tier);
        if used >= quota {
            warn!(key_id = %key.id, tier = %key.tier, used, quota, "⛔ Daily quota exceeded");
            return Err(AppError::quota_exceeded(key.tier, used, quota));
        }
        Ok(())
    }

    /// No-op without an access repository
    pub async fn record_api_usage(&self, event: UsageEvent) -> AppResult<()> {
        match self.access.as_ref() {
            Some(access) => access.record_api_usage(event).await,
            None => Ok(()),
        }
    }

    // ============================================
    // REPORTING
    // ============================================

    /// Units per (key, endpoint) in `[start, end)`, largest first
    pub async fn usage_summary(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tier: Option<ApiKeyTier>,
    ) -> AppResult<Vec<UsageAggregate>> {
        let access = self.access()?;
        let period = ReportPeriod::new(start, end)?;
        let rows = access.list_usage_rows(period, tier).await?;

        let mut order: Vec<(String, String)> = Vec::new();
        let mut groups: HashMap<(String, String), UsageAggregate> = HashMap::new();

        for row in rows {
            let key = (row.api_key_id.clone(), row.endpoint.clone());
            match groups.get_mut(&key) {
                Some(existing) => existing.total_units += row.request_units,
                None => {
                    order.push(key.clone());
                    groups.insert(
                        key,
                        UsageAggregate {
                            api_key_id: row.api_key_id,
                            key_name: row.key_name,
                            key_prefix: row.key_prefix,
                            tier: row.tier,
                            endpoint: row.endpoint,
                            total_units: row.request_units,
                        },
                    );
                }
            }
        }

        let mut aggregates: Vec<UsageAggregate> =
            order.iter().filter_map(|k| groups.remove(k)).collect();
        // stable: ties keep first-seen order
        aggregates.sort_by(|a, b| b.total_units.cmp(&a.total_units));
        Ok(aggregates)
    }

    /// Billable-tier usage priced per unit, rounded to 4 decimals
    pub async fn invoice_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<InvoiceReport> {
        let billing = self.config.billing;
        let usage = self.usage_summary(start, end, None).await?;

        let line_items: Vec<InvoiceLineItem> = usage
            .into_iter()
            .filter(|row| row.tier == billing.billable_tier)
            .map(|row| InvoiceLineItem {
                amount_usd: round_usd(row.total_units as f64 * billing.unit_price_usd),
                api_key_id: row.api_key_id,
                key_name: row.key_name,
                key_prefix: row.key_prefix,
                tier: row.tier,
                endpoint: row.endpoint,
                billable_units: row.total_units,
                unit_price_usd: billing.unit_price_usd,
            })
            .collect();

        let total_amount_usd = round_usd(line_items.iter().map(|l| l.amount_usd).sum());

        Ok(InvoiceReport {
            currency: INVOICE_CURRENCY,
            period_start: start,
            period_end: end,
            total_amount_usd,
            line_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::InMemoryRepository;
    use crate::models::errors::ErrorCode;
    use crate::models::types::{RiskLevel, Severity, TargetType};
    use crate::utils::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn offline_service() -> (ScanService, Arc<InMemoryRepository>) {
        let config = ServiceConfig::offline();
        let repo = Arc::new(InMemoryRepository::new());
        let analyzers = AnalyzerRegistry::from_config(&config.providers).unwrap();
        let service = ScanService::new(repo.clone(), Some(repo.clone()), analyzers, config);
        (service, repo)
    }

    fn evm_target() -> String {
        format!("0x{}", "1".repeat(40))
    }

    #[tokio::test]
    async fn test_analyze_evm_source_override() {
        let (service, _) = offline_service();
        let scan = service
            .analyze(AnalyzeRequest {
                chain: Some("evm".to_string()),
                target_type: TargetType::Source,
                target_value: evm_target(),
                source_code: Some(
                    "contract T { function mint(address a) public onlyOwner {} }".to_string(),
                ),
            })
            .await
            .unwrap();

        assert!(scan
            .findings
            .iter()
            .any(|f| f.severity == Severity::Critical && f.id == "evm-unlimited-mint"));
        assert_eq!(scan.score, 70);
        assert_eq!(scan.risk_level, RiskLevel::Low);
        assert_eq!(scan.engine, "deterministic-rules-v1");
        assert_eq!(
            scan.source_code_hash.as_deref(),
            Some(
                hash_source("contract T { function mint(address a) public onlyOwner {} }")
                    .as_str()
            )
        );
    }

    #[tokio::test]
    async fn test_analyze_placeholder_is_safe() {
        let (service, _) = offline_service();
        let scan = service
            .analyze(AnalyzeRequest {
                target_value: evm_target(),
                ..AnalyzeRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(scan.chain, ChainId::Evm);
        assert_eq!(scan.score, 100);
        assert_eq!(scan.risk_level, RiskLevel::Safe);
        assert!(scan.findings.is_empty());
        assert!(scan.provenance.provider_healthy);
    }

    #[tokio::test]
    async fn test_analyze_rejects_bad_input() {
        let (service, _) = offline_service();

        let err = service.analyze(AnalyzeRequest::default()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let err = service
            .analyze(AnalyzeRequest {
                chain: Some("evm".to_string()),
                target_value: "0x1234".to_string(),
                ..AnalyzeRequest::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTarget);
        assert_eq!(err.message, "Invalid evm target format.");

        let err = service
            .analyze(AnalyzeRequest {
                chain: Some("tron".to_string()),
                target_value: evm_target(),
                ..AnalyzeRequest::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedChain);
    }

    #[tokio::test]
    async fn test_blank_source_does_not_override() {
        let (service, _) = offline_service();
        let scan = service
            .analyze(AnalyzeRequest {
                target_value: evm_target(),
                source_code: Some("   ".to_string()),
                ..AnalyzeRequest::default()
            })
            .await
            .unwrap();
        let placeholder = format!(
            "// EVM contract {}\ncontract Unknown {{}}",
            "0x1111111111111111111111111111111111111111"
        );
        assert_eq!(scan.source_code_hash, Some(hash_source(&placeholder)));
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let (service, _) = offline_service();
        let created = service.create_api_key("  ci  ", ApiKeyTier::Pro).await.unwrap();

        assert_eq!(created.record.name, "ci");
        assert!(created.token.starts_with("rgs_pro_"));
        assert_eq!(created.record.key_prefix, &created.token[..16]);
        assert!(service.authenticate_api_key(&created.token).await.unwrap().is_some());
        assert!(service.authenticate_api_key("").await.unwrap().is_none());

        let rotated = service.rotate_api_key(&created.token, None).await.unwrap();
        assert_eq!(rotated.record.name, "ci-rotated");
        assert_eq!(rotated.record.tier, ApiKeyTier::Pro);
        assert!(service.authenticate_api_key(&created.token).await.unwrap().is_none());
        assert!(service.authenticate_api_key(&rotated.token).await.unwrap().is_some());

        assert!(service.revoke_api_key(&rotated.record.id).await.unwrap());
        assert!(service.authenticate_api_key(&rotated.token).await.unwrap().is_none());

        let err = service.rotate_api_key(&rotated.token, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_key_name_required() {
        let (service, _) = offline_service();
        let err = service.create_api_key("   ", ApiKeyTier::Free).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn test_quota_resets_at_utc_midnight() {
        let mut config = ServiceConfig::offline();
        config.quotas.free = 2;
        let start = Utc.with_ymd_and_hms(2025, 5, 20, 22, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let repo = Arc::new(InMemoryRepository::with_clock(clock.clone()));
        let analyzers = AnalyzerRegistry::from_config(&config.providers).unwrap();
        let service = ScanService::new(repo.clone(), Some(repo), analyzers, config)
            .with_clock(clock.clone());

        let key = service.create_api_key("free", ApiKeyTier::Free).await.unwrap().record;
        for _ in 0..2 {
            service.enforce_daily_quota(&key).await.unwrap();
            service
                .record_api_usage(UsageEvent::new(&key.id, "/api/v1/analyze"))
                .await
                .unwrap();
        }

        let err = service.enforce_daily_quota(&key).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::QuotaExceeded);
        let snapshot = err.quota.unwrap();
        assert_eq!((snapshot.used, snapshot.quota, snapshot.tier), (2, 2, ApiKeyTier::Free));

        clock.advance(Duration::hours(3));
        service.enforce_daily_quota(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_invoice_three_units() {
        let (service, _) = offline_service();
        let api = service.create_api_key("billing", ApiKeyTier::Api).await.unwrap().record;
        let free = service.create_api_key("hobby", ApiKeyTier::Free).await.unwrap().record;

        for _ in 0..3 {
            service
                .record_api_usage(UsageEvent::new(&api.id, "/api/v1/analyze"))
                .await
                .unwrap();
        }
        service
            .record_api_usage(UsageEvent::new(&free.id, "/api/v1/analyze"))
            .await
            .unwrap();

        let end = service.now() + Duration::minutes(1);
        let start = end - Duration::days(1);
        let invoice = service.invoice_report(start, end).await.unwrap();

        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.line_items.len(), 1);
        assert_eq!(invoice.line_items[0].billable_units, 3);
        assert_eq!(invoice.line_items[0].amount_usd, 0.15);
        assert_eq!(invoice.total_amount_usd, 0.15);
    }

    #[tokio::test]
    async fn test_usage_summary_groups_by_key_and_endpoint() {
        let (service, _) = offline_service();
        let a = service.create_api_key("a", ApiKeyTier::Pro).await.unwrap().record;
        let b = service.create_api_key("b", ApiKeyTier::Pro).await.unwrap().record;

        service.record_api_usage(UsageEvent::new(&a.id, "/x")).await.unwrap();
        service.record_api_usage(UsageEvent::new(&b.id, "/x").with_units(5)).await.unwrap();
        service.record_api_usage(UsageEvent::new(&a.id, "/y")).await.unwrap();
        service.record_api_usage(UsageEvent::new(&a.id, "/x")).await.unwrap();

        let end = service.now() + Duration::minutes(1);
        let summary = service
            .usage_summary(end - Duration::days(1), end, None)
            .await
            .unwrap();

        let view: Vec<_> = summary
            .iter()
            .map(|r| (r.key_name.as_str(), r.endpoint.as_str(), r.total_units))
            .collect();
        assert_eq!(view, vec![("b", "/x", 5), ("a", "/x", 2), ("a", "/y", 1)]);
    }

    #[tokio::test]
    async fn test_report_period_validated() {
        let (service, _) = offline_service();
        let now = service.now();
        let err = service.usage_summary(now, now, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn test_without_access_repository() {
        let config = ServiceConfig::offline();
        let repo = Arc::new(InMemoryRepository::new());
        let analyzers = AnalyzerRegistry::from_config(&config.providers).unwrap();
        let service = ScanService::new(repo, None, analyzers, config);

        assert!(service.authenticate_api_key("rgs_free_x").await.unwrap().is_none());
        service
            .record_api_usage(UsageEvent::new("k", "/api/v1/analyze"))
            .await
            .unwrap();

        let err = service.create_api_key("x", ApiKeyTier::Free).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AccessNotConfigured);
        let err = service.list_api_keys(None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AccessNotConfigured);
    }
}
