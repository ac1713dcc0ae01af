//! Persistence seams consumed by the orchestration services.
//!
//! Implemented by [`crate::services::Database`] (Postgres) and
//! [`crate::services::InMemoryStore`]. Methods documented as atomic must
//! either apply all of their writes or none.

use crate::error::DomainError;
use crate::models::{
    Actor, BankTransaction, Contract, ContractAmendment, ContractItem, ContractItemPrice,
    ImportedInvoice, InvoiceDraft, InvoiceLine, InvoicePaymentMatch, InvoiceRecord, MatchType,
    NewAmendment, NewItemPrice, NumberingScheme, PatternFlags, RecurringPattern, ResetPeriod,
};
use crate::patterns::DetectedPattern;
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn get_contract(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Option<Contract>, AppError>;

    /// Contracts of a tenant that are not deleted.
    async fn list_contracts(&self, tenant_id: Uuid) -> Result<Vec<Contract>, AppError>;

    async fn list_items(&self, tenant_id: Uuid, contract_id: Uuid)
        -> Result<Vec<ContractItem>, AppError>;

    async fn get_item(&self, tenant_id: Uuid, item_id: Uuid)
        -> Result<Option<ContractItem>, AppError>;

    /// Price periods of all given items.
    async fn list_item_prices(
        &self,
        tenant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ContractItemPrice>, AppError>;

    async fn product_names(
        &self,
        tenant_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError>;

    /// Persist `item` and append `amendment`. Atomic.
    async fn update_item(
        &self,
        tenant_id: Uuid,
        item: &ContractItem,
        amendment: &NewAmendment,
    ) -> Result<ContractItem, AppError>;

    /// Validate `price` against the item's current periods, insert it and
    /// append `amendment`. Atomic; validation sees committed state only.
    async fn insert_price_period(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        price: &NewItemPrice,
        amendment: &NewAmendment,
    ) -> Result<ContractItemPrice, DomainError>;

    async fn list_amendments(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<ContractAmendment>, AppError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Transactions booked in `[from, to]`, ordered by booking date.
    async fn list_transactions(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankTransaction>, AppError>;

    async fn get_transaction(
        &self,
        tenant_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<BankTransaction>, AppError>;

    async fn tenants_with_transactions(&self) -> Result<Vec<Uuid>, AppError>;

    /// Create or update one pattern per (counterparty key, sign). User flags
    /// of existing patterns are kept. Atomic across all patterns.
    async fn upsert_patterns(
        &self,
        tenant_id: Uuid,
        patterns: &[DetectedPattern],
    ) -> Result<Vec<RecurringPattern>, AppError>;

    async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<RecurringPattern>, AppError>;

    /// `None` when the pattern does not exist for the tenant.
    async fn set_pattern_flags(
        &self,
        tenant_id: Uuid,
        pattern_id: Uuid,
        flags: PatternFlags,
    ) -> Result<Option<RecurringPattern>, AppError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get_imported_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<ImportedInvoice>, AppError>;

    async fn matched_transaction_ids(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<HashSet<Uuid>, AppError>;

    /// Create the match, or return the existing one for the same pair.
    async fn create_match(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        transaction_id: Uuid,
        match_type: MatchType,
        confidence: f64,
    ) -> Result<InvoicePaymentMatch, AppError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn find_invoice(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<Option<InvoiceRecord>, AppError>;

    /// Assign the next number under a per-tenant lock and store the invoice
    /// with its lines. Atomic. If an invoice for the same contract and
    /// billing date already exists it is returned and no number is used.
    async fn create_invoice(
        &self,
        tenant_id: Uuid,
        draft: &InvoiceDraft,
        issue_date: NaiveDate,
        actor: &Actor,
    ) -> Result<InvoiceRecord, AppError>;

    async fn list_invoice_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, AppError>;

    async fn get_numbering_scheme(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<NumberingScheme>, AppError>;

    /// Set the pattern and reset period. The counter is kept.
    async fn configure_numbering_scheme(
        &self,
        tenant_id: Uuid,
        pattern: &str,
        reset_period: ResetPeriod,
    ) -> Result<NumberingScheme, AppError>;
}
