//! Payment matching for imported invoices.

use crate::error::DomainError;
use crate::matching::{MatchCandidate, PaymentMatcher};
use crate::models::{InvoicePaymentMatch, MatchType};
use crate::services::metrics::record_payment_match;
use crate::services::store::{PaymentStore, TransactionStore};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentMatchingService {
    payments: Arc<dyn PaymentStore>,
    transactions: Arc<dyn TransactionStore>,
    matcher: Arc<PaymentMatcher>,
    days_after: i64,
}

impl PaymentMatchingService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        transactions: Arc<dyn TransactionStore>,
        matcher: PaymentMatcher,
        days_after: i64,
    ) -> Self {
        Self {
            payments,
            transactions,
            matcher: Arc::new(matcher),
            days_after,
        }
    }

    pub fn days_after(&self) -> i64 {
        self.days_after
    }

    /// Ranked payment candidates for an imported invoice. `days_after`
    /// overrides the configured search window.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn find_matches(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        days_after: Option<i64>,
    ) -> Result<Vec<MatchCandidate>, DomainError> {
        let invoice = self
            .payments
            .get_imported_invoice(tenant_id, invoice_id)
            .await?
            .ok_or(DomainError::InvoiceNotFound(invoice_id))?;

        let days_after = days_after.unwrap_or(self.days_after);
        let Some((start, end)) = PaymentMatcher::candidate_window(&invoice, days_after) else {
            debug!("Invoice has no date, nothing to match");
            return Ok(Vec::new());
        };

        let transactions = self
            .transactions
            .list_transactions(tenant_id, start, end)
            .await?;
        let already_matched = self
            .payments
            .matched_transaction_ids(tenant_id, invoice_id)
            .await?;

        let candidates =
            self.matcher
                .find_matches(&invoice, &transactions, &already_matched, days_after);
        for candidate in &candidates {
            record_payment_match(candidate.match_type.as_str(), "proposed");
        }
        info!(
            scanned = transactions.len(),
            candidates = candidates.len(),
            "Payment candidates computed"
        );
        Ok(candidates)
    }

    /// Persist a match. Confirming the same pair twice returns the first row.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id, transaction_id = %transaction_id))]
    pub async fn confirm_match(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        transaction_id: Uuid,
        match_type: MatchType,
        confidence: f64,
    ) -> Result<InvoicePaymentMatch, DomainError> {
        if self
            .payments
            .get_imported_invoice(tenant_id, invoice_id)
            .await?
            .is_none()
        {
            return Err(DomainError::InvoiceNotFound(invoice_id));
        }
        if self
            .transactions
            .get_transaction(tenant_id, transaction_id)
            .await?
            .is_none()
        {
            return Err(DomainError::TransactionNotFound(transaction_id));
        }

        let row = self
            .payments
            .create_match(
                tenant_id,
                invoice_id,
                transaction_id,
                match_type,
                confidence.clamp(0.0, 1.0),
            )
            .await?;
        record_payment_match(match_type.as_str(), "confirmed");
        Ok(row)
    }
}
