//! Recurring pattern detection runs and liquidity projections.

use crate::error::DomainError;
use crate::models::{PatternFlags, RecurringPattern};
use crate::patterns::{detect_patterns, lookback_start, project_cash_flows, ProjectedCashFlow};
use crate::services::metrics::record_pattern_detection;
use crate::services::store::TransactionStore;
use chrono::NaiveDate;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Outcome of a refresh over all tenants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub tenants: usize,
    pub failed: usize,
    pub patterns: usize,
}

#[derive(Clone)]
pub struct PatternService {
    store: Arc<dyn TransactionStore>,
}

impl PatternService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Detect recurring patterns in the tenant's trailing history and upsert
    /// them. Re-running on unchanged data updates the same rows.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn detect_recurring_patterns(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<RecurringPattern>, AppError> {
        let result = async {
            let transactions = self
                .store
                .list_transactions(tenant_id, lookback_start(today), today)
                .await?;
            let detected = detect_patterns(&transactions, today);
            info!(
                transactions = transactions.len(),
                detected = detected.len(),
                "Pattern detection finished"
            );
            self.store.upsert_patterns(tenant_id, &detected).await
        }
        .await;

        record_pattern_detection(if result.is_ok() { "success" } else { "failure" });
        result
    }

    /// Run detection for every tenant with bank transactions. A failing
    /// tenant is logged and skipped.
    pub async fn refresh_all(&self, today: NaiveDate) -> Result<RefreshSummary, AppError> {
        let tenants = self.store.tenants_with_transactions().await?;
        let mut summary = RefreshSummary {
            tenants: tenants.len(),
            ..Default::default()
        };

        for tenant_id in tenants {
            match self.detect_recurring_patterns(tenant_id, today).await {
                Ok(patterns) => summary.patterns += patterns.len(),
                Err(e) => {
                    summary.failed += 1;
                    error!(tenant_id = %tenant_id, error = %e, "Pattern refresh failed for tenant");
                }
            }
        }
        Ok(summary)
    }

    pub async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<RecurringPattern>, AppError> {
        self.store.list_patterns(tenant_id).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, pattern_id = %pattern_id))]
    pub async fn set_flags(
        &self,
        tenant_id: Uuid,
        pattern_id: Uuid,
        flags: PatternFlags,
    ) -> Result<RecurringPattern, DomainError> {
        let pattern = self
            .store
            .set_pattern_flags(tenant_id, pattern_id, flags)
            .await?
            .ok_or(DomainError::PatternNotFound(pattern_id))?;
        info!(
            confirmed = pattern.is_confirmed,
            ignored = pattern.is_ignored,
            paused = pattern.is_paused,
            "Pattern flags updated"
        );
        Ok(pattern)
    }

    /// Expected cash flows from the tenant's stored patterns in `[from, to]`.
    pub async fn cash_flow_forecast(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProjectedCashFlow>, AppError> {
        let patterns = self.store.list_patterns(tenant_id).await?;
        Ok(project_cash_flows(&patterns, from, to))
    }
}
