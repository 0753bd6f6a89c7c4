//! Persistence (spec §4.5, §6): SQLite-backed storage with a bounded
//! single-writer channel, batch flush, and JSON-lines fallback; the read
//! path in [`query`]; and the position [`reconciler`].

pub mod error;
pub mod migrations;
pub mod query;
pub mod reconciler;
pub mod writer;

pub use error::StorageError;
pub use reconciler::{LocalTruth, PositionReconciler, ReconciliationConfig};
pub use writer::{Storage, StorageConfig, WriteRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{Event, Severity};
use engine_execution::event_center::RetentionPolicy;
use engine_execution::EventPersister;
use rust_decimal::Decimal;

impl Storage {
    pub fn query_trades(&self, start: DateTime<Utc>, end: DateTime<Utc>, limit: i64, offset: i64) -> Result<Vec<query::TradeRow>, StorageError> {
        Ok(query::query_trades(&self.db_path, start, end, limit, offset)?)
    }

    pub fn get_pnl_by_symbol(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<query::PnlSummary, StorageError> {
        Ok(query::get_pnl_by_symbol(&self.db_path, symbol, start, end)?)
    }

    pub fn get_pnl_by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<query::PnlSummary>, StorageError> {
        Ok(query::get_pnl_by_time_range(&self.db_path, start, end)?)
    }

    pub fn get_statistics_summary(&self) -> Result<query::StatisticsSummary, StorageError> {
        Ok(query::get_statistics_summary(&self.db_path)?)
    }

    pub fn get_statistics_summary_by_exchange(&self, exchange: &str) -> Result<query::StatisticsSummary, StorageError> {
        Ok(query::get_statistics_summary_by_exchange(&self.db_path, exchange)?)
    }

    pub fn query_reconciliation_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<query::ReconciliationRow>, StorageError> {
        Ok(query::query_reconciliation_history(&self.db_path, symbol, start, end, limit, offset)?)
    }

    pub fn get_latest_reconciliation_history(&self, symbol: &str) -> Result<Option<query::ReconciliationRow>, StorageError> {
        Ok(query::get_latest_reconciliation_history(&self.db_path, symbol)?)
    }

    pub fn query_risk_check_history(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, i64)>, StorageError> {
        Ok(query::query_risk_check_history(&self.db_path, symbol, start, end)?)
    }

    /// Returns `true` (and the caller should insert) iff the new rate
    /// differs from the latest persisted rate by more than `1e-7`.
    pub fn funding_rate_changed(&self, symbol: &str, new_rate: Decimal) -> Result<bool, StorageError> {
        Ok(query::funding_rate_changed(&self.db_path, symbol, new_rate)?)
    }
}


/// Bridges the Event Center's async persistence call onto the storage
/// writer's non-blocking `save()` — the storage crate implements the
/// execution crate's narrow persistence trait rather than the other way
/// around, so `engine-execution` never depends on `engine-storage`.
#[async_trait]
impl EventPersister for Storage {
    async fn persist(&self, event: &Event) -> anyhow::Result<()> {
        self.save(WriteRecord::Event(event.clone()));
        Ok(())
    }

    async fn cleanup_events(&self, severity: Severity, policy: RetentionPolicy) -> anyhow::Result<()> {
        let db_path = self.db_path.clone();
        let severity_str = format!("{:?}", severity);
        let deleted =
            tokio::task::spawn_blocking(move || query::cleanup_events(&db_path, &severity_str, policy.retention_days, policy.max_count))
                .await??;
        if deleted > 0 {
            tracing::debug!(?severity, deleted, "event cleanup swept rows");
        }
        Ok(())
    }
}
