//! Invoice generation from billing schedules.

use crate::error::DomainError;
use crate::invoicing::{draft_invoices, has_counter_placeholder, month_window};
use crate::models::{Actor, InvoiceLine, InvoiceRecord, NumberingScheme, ResetPeriod};
use crate::services::contracts::ContractService;
use crate::services::metrics::{record_error, record_invoice_generated};
use crate::services::store::InvoiceStore;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct InvoiceService {
    contracts: ContractService,
    store: Arc<dyn InvoiceStore>,
}

impl InvoiceService {
    pub fn new(contracts: ContractService, store: Arc<dyn InvoiceStore>) -> Self {
        Self { contracts, store }
    }

    /// Create invoices for every billing event of the month across all
    /// contracts active on its first day. Idempotent per contract and
    /// billing date: events already invoiced return the stored invoice.
    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id, year = year, month = month))]
    pub async fn generate_for_month(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
        actor: &Actor,
    ) -> Result<Vec<InvoiceRecord>, DomainError> {
        let window =
            month_window(year, month).ok_or(DomainError::InvalidBillingMonth { year, month })?;

        let bundles = self.contracts.active_bundles(tenant_id, window.from).await?;
        let mut invoices = Vec::new();
        let (mut created, mut existing) = (0usize, 0usize);

        for bundle in &bundles {
            let events = bundle.billing_schedule(&window);
            for draft in draft_invoices(bundle, &events) {
                if let Some(invoice) = self
                    .store
                    .find_invoice(tenant_id, draft.contract_id, draft.billing_date)
                    .await?
                {
                    existing += 1;
                    record_invoice_generated("existing");
                    invoices.push(invoice);
                    continue;
                }

                match self
                    .store
                    .create_invoice(tenant_id, &draft, draft.billing_date, actor)
                    .await
                {
                    Ok(invoice) => {
                        created += 1;
                        record_invoice_generated("created");
                        invoices.push(invoice);
                    }
                    Err(e) => {
                        error!(
                            contract_id = %draft.contract_id,
                            billing_date = %draft.billing_date,
                            error = %e,
                            "Invoice creation failed"
                        );
                        record_error("invoice_creation");
                        return Err(e.into());
                    }
                }
            }
        }

        info!(
            contracts = bundles.len(),
            created = created,
            existing = existing,
            "Monthly invoice run finished"
        );
        Ok(invoices)
    }

    pub async fn invoice_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, DomainError> {
        Ok(self.store.list_invoice_lines(tenant_id, invoice_id).await?)
    }

    /// The tenant's scheme, or the default one if none was configured.
    pub async fn numbering_scheme(&self, tenant_id: Uuid) -> Result<NumberingScheme, DomainError> {
        Ok(self
            .store
            .get_numbering_scheme(tenant_id)
            .await?
            .unwrap_or_else(|| NumberingScheme::default_for(tenant_id)))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn configure_numbering(
        &self,
        tenant_id: Uuid,
        pattern: &str,
        reset_period: ResetPeriod,
    ) -> Result<NumberingScheme, DomainError> {
        if !has_counter_placeholder(pattern) {
            warn!(pattern = %pattern, "Numbering pattern rejected");
            return Err(DomainError::InvalidNumberingPattern(pattern.to_string()));
        }
        Ok(self
            .store
            .configure_numbering_scheme(tenant_id, pattern, reset_period)
            .await?)
    }
}
