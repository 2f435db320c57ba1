//! In-memory repository (development, tests, single-node deployments)
//!
//! All state sits behind one `tokio::sync::RwLock`, so multi-step writes
//! (usage recording, key replacement) are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::repository::{AccessRepository, ScanRepository};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    ApiKeyRecord, ApiKeyTier, ChainId, NewApiKey, NewScan, ReportPeriod, ScanFilter, StoredScan,
    UsageEvent, UsageSummaryRow,
};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::constants::{DEFAULT_KEY_LIST_LIMIT, DEFAULT_SCAN_LIST_LIMIT};

struct KeyRow {
    record: ApiKeyRecord,
    key_hash: String,
}

struct UsageRow {
    api_key_id: String,
    endpoint: String,
    chain: Option<ChainId>,
    request_units: u64,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    /// Insertion order = creation order
    scans: Vec<StoredScan>,
    keys: Vec<KeyRow>,
    usage: Vec<UsageRow>,
}

impl Store {
    fn insert_key(&mut self, key: NewApiKey, now: DateTime<Utc>) -> ApiKeyRecord {
        let record = ApiKeyRecord {
            id: Uuid::new_v4().to_string(),
            name: key.name,
            tier: key.tier,
            key_prefix: key.key_prefix,
            active: true,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
        };
        self.keys.push(KeyRow {
            record: record.clone(),
            key_hash: key.key_hash,
        });
        record
    }

    fn deactivate(&mut self, id: &str) -> bool {
        match self
            .keys
            .iter_mut()
            .find(|k| k.record.id == id && k.record.active)
        {
            Some(row) => {
                row.record.active = false;
                true
            }
            None => false,
        }
    }
}

pub struct InMemoryRepository {
    state: RwLock<Store>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Timestamps come from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(Store::default()),
            clock,
        }
    }
}

#[async_trait]
impl ScanRepository for InMemoryRepository {
    async fn create_scan(&self, scan: NewScan) -> AppResult<StoredScan> {
        let report = scan.report;
        let stored = StoredScan {
            id: Uuid::new_v4().to_string(),
            chain: report.chain,
            target_type: report.target_type,
            target_value: report.target_value,
            score: report.score,
            risk_level: report.risk_level,
            summary: report.summary,
            findings: report.findings,
            engine: report.engine,
            analysis_time_ms: report.analysis_time_ms,
            provenance: report.provenance,
            source_code_hash: scan.source_code_hash,
            created_at: report.created_at,
        };

        self.state.write().await.scans.push(stored.clone());
        debug!(scan_id = %stored.id, chain = %stored.chain, "Scan stored");
        Ok(stored)
    }

    async fn get_scan_by_id(&self, id: &str) -> AppResult<Option<StoredScan>> {
        let state = self.state.read().await;
        Ok(state.scans.iter().find(|s| s.id == id).cloned())
    }

    async fn list_scans(&self, filter: &ScanFilter) -> AppResult<Vec<StoredScan>> {
        let state = self.state.read().await;
        let limit = filter.limit.unwrap_or(DEFAULT_SCAN_LIST_LIMIT);

        Ok(state
            .scans
            .iter()
            .rev()
            .filter(|s| filter.chain.map_or(true, |c| s.chain == c))
            .filter(|s| {
                filter
                    .target_value
                    .as_deref()
                    .map_or(true, |t| s.target_value == t)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccessRepository for InMemoryRepository {
    async fn create_api_key(&self, key: NewApiKey) -> AppResult<ApiKeyRecord> {
        let now = self.clock.now();
        let record = self.state.write().await.insert_key(key, now);
        info!(
            key_id = %record.id,
            prefix = %record.key_prefix,
            tier = %record.tier,
            "🔑 API key created"
        );
        Ok(record)
    }

    async fn find_active_api_key_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKeyRecord>> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .iter()
            .find(|k| k.record.active && k.key_hash == key_hash)
            .map(|k| k.record.clone()))
    }

    async fn list_api_keys(&self, limit: Option<usize>) -> AppResult<Vec<ApiKeyRecord>> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .iter()
            .rev()
            .take(limit.unwrap_or(DEFAULT_KEY_LIST_LIMIT))
            .map(|k| k.record.clone())
            .collect())
    }

    async fn revoke_api_key(&self, id: &str) -> AppResult<bool> {
        let revoked = self.state.write().await.deactivate(id);
        if revoked {
            info!(key_id = id, "🔒 API key revoked");
        }
        Ok(revoked)
    }

    async fn replace_api_key(
        &self,
        old_id: &str,
        replacement: NewApiKey,
    ) -> AppResult<ApiKeyRecord> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        // a key already rotated or revoked has no successor to mint
        if !state.deactivate(old_id) {
            return Err(AppError::unauthorized("Invalid or inactive API key."));
        }
        let record = state.insert_key(replacement, now);
        info!(old_key_id = old_id, new_key_id = %record.id, "🔄 API key replaced");
        Ok(record)
    }

    async fn record_api_usage(&self, event: UsageEvent) -> AppResult<()> {
        let now = self.clock.now();
        let units = event.request_units.max(1);
        let mut state = self.state.write().await;

        let key = state
            .keys
            .iter_mut()
            .find(|k| k.record.id == event.api_key_id)
            .ok_or_else(|| {
                AppError::not_found(format!("API key '{}' not found.", event.api_key_id))
            })?;
        key.record.usage_count += units;
        key.record.last_used_at = Some(now);

        state.usage.push(UsageRow {
            api_key_id: event.api_key_id,
            endpoint: event.endpoint,
            chain: event.chain,
            request_units: units,
            created_at: now,
        });
        Ok(())
    }

    async fn count_api_usage_since(
        &self,
        api_key_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .usage
            .iter()
            .filter(|u| u.api_key_id == api_key_id && u.created_at >= since)
            .map(|u| u.request_units)
            .sum())
    }

    async fn list_usage_rows(
        &self,
        period: ReportPeriod,
        tier: Option<ApiKeyTier>,
    ) -> AppResult<Vec<UsageSummaryRow>> {
        let state = self.state.read().await;

        Ok(state
            .usage
            .iter()
            .filter(|u| period.contains(u.created_at))
            .filter_map(|u| {
                let key = state.keys.iter().find(|k| k.record.id == u.api_key_id)?;
                if tier.map_or(false, |t| key.record.tier != t) {
                    return None;
                }
                Some(UsageSummaryRow {
                    api_key_id: u.api_key_id.clone(),
                    key_name: key.record.name.clone(),
                    key_prefix: key.record.key_prefix.clone(),
                    tier: key.record.tier,
                    endpoint: u.endpoint.clone(),
                    chain: u.chain,
                    request_units: u.request_units,
                    created_at: u.created_at,
                })
            })
            .collect())
    }
}
