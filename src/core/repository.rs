//! Persistence contract
//!
//! The service only talks to these two traits. Any store (SQL, KV, the
//! in-memory one in `core::memory`) can back them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    ApiKeyRecord, ApiKeyTier, NewApiKey, NewScan, ReportPeriod, ScanFilter, StoredScan,
    UsageEvent, UsageSummaryRow,
};

/// Scan storage
#[async_trait]
pub trait ScanRepository: Send + Sync {
    /// Persist a report; the store assigns id
    async fn create_scan(&self, scan: NewScan) -> AppResult<StoredScan>;

    async fn get_scan_by_id(&self, id: &str) -> AppResult<Option<StoredScan>>;

    /// Newest first, `filter.limit` rows at most (store default when unset)
    async fn list_scans(&self, filter: &ScanFilter) -> AppResult<Vec<StoredScan>>;
}

/// API key and usage storage
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Insert an active key with zero usage
    async fn create_api_key(&self, key: NewApiKey) -> AppResult<ApiKeyRecord>;

    /// Active key whose stored hash equals `key_hash`
    async fn find_active_api_key_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKeyRecord>>;

    /// Newest first
    async fn list_api_keys(&self, limit: Option<usize>) -> AppResult<Vec<ApiKeyRecord>>;

    /// Deactivate; `false` when the id is unknown or already inactive
    async fn revoke_api_key(&self, id: &str) -> AppResult<bool>;

    /// Issue `replacement` and deactivate `old_id`.
    ///
    /// The default runs create then revoke as two calls, so for a short
    /// window both keys authenticate. Stores with transactions should
    /// override this to do both at once.
    async fn replace_api_key(
        &self,
        old_id: &str,
        replacement: NewApiKey,
    ) -> AppResult<ApiKeyRecord> {
        let created = self.create_api_key(replacement).await?;
        if !self.revoke_api_key(old_id).await? {
            // lost a race with another rotation or a revoke
            self.revoke_api_key(&created.id).await?;
            return Err(AppError::unauthorized("Invalid or inactive API key."));
        }
        Ok(created)
    }

    /// Append the event, bump the key's usage counter and last-used time, atomically
    async fn record_api_usage(&self, event: UsageEvent) -> AppResult<()>;

    /// Units recorded for the key at or after `since`
    async fn count_api_usage_since(&self, api_key_id: &str, since: DateTime<Utc>) -> AppResult<u64>;

    /// Events in `[period.start, period.end)` joined with their key, oldest first
    async fn list_usage_rows(
        &self,
        period: ReportPeriod,
        tier: Option<ApiKeyTier>,
    ) -> AppResult<Vec<UsageSummaryRow>>;
}
