//! In-memory store for tests and local runs without Postgres.
//!
//! Every write takes the single state lock, which gives the same atomicity
//! and per-tenant serialization the Postgres store gets from transactions
//! and row locks.

use crate::billing::price::validate_price_period;
use crate::error::DomainError;
use crate::invoicing::next_number;
use crate::models::{
    Actor, BankTransaction, Contract, ContractAmendment, ContractItem, ContractItemPrice,
    ContractStatus, ImportedInvoice, InvoiceDraft, InvoiceLine, InvoicePaymentMatch,
    InvoiceRecord, InvoiceStatus, MatchType, NewAmendment, NewItemPrice, NumberingScheme,
    PatternFlags, Product, RecurringPattern, ResetPeriod,
};
use crate::patterns::DetectedPattern;
use crate::services::store::{ContractStore, InvoiceStore, PaymentStore, TransactionStore};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct State {
    contracts: HashMap<Uuid, Contract>,
    items: HashMap<Uuid, ContractItem>,
    prices: Vec<ContractItemPrice>,
    products: HashMap<Uuid, Product>,
    amendments: Vec<ContractAmendment>,
    transactions: Vec<BankTransaction>,
    patterns: Vec<RecurringPattern>,
    imported_invoices: HashMap<Uuid, ImportedInvoice>,
    matches: Vec<InvoicePaymentMatch>,
    schemes: HashMap<Uuid, NumberingScheme>,
    invoices: Vec<InvoiceRecord>,
    lines: Vec<InvoiceLine>,
}

impl State {
    fn push_amendment(&mut self, tenant_id: Uuid, amendment: &NewAmendment) {
        self.amendments.push(ContractAmendment {
            amendment_id: Uuid::new_v4(),
            tenant_id,
            contract_id: amendment.contract_id,
            item_id: amendment.item_id,
            amendment_type: amendment.amendment_type.as_str().to_string(),
            changes: amendment.changes_json(),
            actor_user_id: amendment.actor.user_id,
            actor_name: amendment.actor.name.clone(),
            created_utc: Utc::now(),
        });
    }

    fn find_invoice(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Option<&InvoiceRecord> {
        self.invoices.iter().find(|i| {
            i.tenant_id == tenant_id && i.contract_id == contract_id && i.billing_date == billing_date
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contract(&self, contract: Contract) {
        self.state
            .write()
            .await
            .contracts
            .insert(contract.contract_id, contract);
    }

    pub async fn insert_item(&self, item: ContractItem) {
        self.state.write().await.items.insert(item.item_id, item);
    }

    pub async fn insert_price(&self, price: ContractItemPrice) {
        self.state.write().await.prices.push(price);
    }

    pub async fn insert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.product_id, product);
    }

    pub async fn insert_transaction(&self, transaction: BankTransaction) {
        self.state.write().await.transactions.push(transaction);
    }

    pub async fn insert_imported_invoice(&self, invoice: ImportedInvoice) {
        self.state
            .write()
            .await
            .imported_invoices
            .insert(invoice.invoice_id, invoice);
    }

    pub async fn pattern_count(&self, tenant_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .patterns
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .count()
    }

    pub async fn invoice_count(&self, tenant_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .invoices
            .iter()
            .filter(|i| i.tenant_id == tenant_id)
            .count()
    }
}

#[async_trait]
impl ContractStore for InMemoryStore {
    async fn get_contract(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Option<Contract>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .contracts
            .get(&contract_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_contracts(&self, tenant_id: Uuid) -> Result<Vec<Contract>, AppError> {
        let state = self.state.read().await;
        let mut contracts: Vec<Contract> = state
            .contracts
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.status() != ContractStatus::Deleted)
            .cloned()
            .collect();
        contracts.sort_by_key(|c| (c.start_date, c.contract_id));
        Ok(contracts)
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<ContractItem>, AppError> {
        let state = self.state.read().await;
        let mut items: Vec<ContractItem> = state
            .items
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.contract_id == contract_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_utc, i.item_id));
        Ok(items)
    }

    async fn get_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<ContractItem>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .items
            .get(&item_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_item_prices(
        &self,
        tenant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ContractItemPrice>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .prices
            .iter()
            .filter(|p| p.tenant_id == tenant_id && item_ids.contains(&p.item_id))
            .cloned()
            .collect())
    }

    async fn product_names(
        &self,
        tenant_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError> {
        let state = self.state.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| state.products.get(id))
            .filter(|p| p.tenant_id == tenant_id)
            .map(|p| (p.product_id, p.name.clone()))
            .collect())
    }

    async fn update_item(
        &self,
        tenant_id: Uuid,
        item: &ContractItem,
        amendment: &NewAmendment,
    ) -> Result<ContractItem, AppError> {
        let mut state = self.state.write().await;
        let stored = state
            .items
            .get_mut(&item.item_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Item {} not found", item.item_id)))?;

        *stored = ContractItem {
            updated_utc: Utc::now(),
            ..item.clone()
        };
        let updated = stored.clone();
        state.push_amendment(tenant_id, amendment);
        Ok(updated)
    }

    async fn insert_price_period(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        price: &NewItemPrice,
        amendment: &NewAmendment,
    ) -> Result<ContractItemPrice, DomainError> {
        let mut state = self.state.write().await;
        if !state
            .items
            .get(&item_id)
            .is_some_and(|i| i.tenant_id == tenant_id)
        {
            return Err(DomainError::ItemNotFound(item_id));
        }

        let existing: Vec<ContractItemPrice> = state
            .prices
            .iter()
            .filter(|p| p.item_id == item_id)
            .cloned()
            .collect();
        validate_price_period(&existing, price)?;

        let inserted = ContractItemPrice {
            price_id: Uuid::new_v4(),
            item_id,
            tenant_id,
            valid_from: price.valid_from,
            valid_to: price.valid_to,
            unit_price: price.unit_price,
            price_period: price.price_period.as_str().to_string(),
            source: price.source.as_str().to_string(),
            created_utc: Utc::now(),
        };
        state.prices.push(inserted.clone());
        state.push_amendment(tenant_id, amendment);
        Ok(inserted)
    }

    async fn list_amendments(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<ContractAmendment>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .amendments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.contract_id == contract_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn list_transactions(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankTransaction>, AppError> {
        let state = self.state.read().await;
        let mut transactions: Vec<BankTransaction> = state
            .transactions
            .iter()
            .filter(|t| t.tenant_id == tenant_id && t.booking_date >= from && t.booking_date <= to)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| (t.booking_date, t.transaction_id));
        Ok(transactions)
    }

    async fn get_transaction(
        &self,
        tenant_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<BankTransaction>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.transaction_id == transaction_id)
            .cloned())
    }

    async fn tenants_with_transactions(&self) -> Result<Vec<Uuid>, AppError> {
        let state = self.state.read().await;
        let tenants: BTreeSet<Uuid> = state.transactions.iter().map(|t| t.tenant_id).collect();
        Ok(tenants.into_iter().collect())
    }

    async fn upsert_patterns(
        &self,
        tenant_id: Uuid,
        patterns: &[DetectedPattern],
    ) -> Result<Vec<RecurringPattern>, AppError> {
        let mut state = self.state.write().await;
        let mut saved = Vec::with_capacity(patterns.len());
        let mut created = 0usize;

        for detected in patterns {
            let now = Utc::now();
            let existing = state.patterns.iter_mut().find(|p| {
                p.tenant_id == tenant_id
                    && p.counterparty_key == detected.counterparty_key
                    && p.sign() == Some(detected.sign)
            });

            let row = match existing {
                Some(pattern) => {
                    pattern.counterparty_id = detected.counterparty_id;
                    pattern.counterparty_name = detected.counterparty_name.clone();
                    pattern.average_amount = detected.average_amount;
                    pattern.frequency = detected.frequency.as_str().to_string();
                    pattern.day_of_month = detected.day_of_month;
                    pattern.confidence_score = detected.confidence_score;
                    pattern.last_occurrence = detected.last_occurrence;
                    pattern.source_transaction_ids = detected.transaction_ids.clone();
                    pattern.updated_utc = now;
                    pattern.clone()
                }
                None => {
                    created += 1;
                    let pattern = RecurringPattern {
                        pattern_id: Uuid::new_v4(),
                        tenant_id,
                        counterparty_key: detected.counterparty_key.clone(),
                        counterparty_id: detected.counterparty_id,
                        counterparty_name: detected.counterparty_name.clone(),
                        average_amount: detected.average_amount,
                        frequency: detected.frequency.as_str().to_string(),
                        day_of_month: detected.day_of_month,
                        confidence_score: detected.confidence_score,
                        is_confirmed: false,
                        is_ignored: false,
                        is_paused: false,
                        last_occurrence: detected.last_occurrence,
                        source_transaction_ids: detected.transaction_ids.clone(),
                        created_utc: now,
                        updated_utc: now,
                    };
                    state.patterns.push(pattern.clone());
                    pattern
                }
            };
            saved.push(row);
        }

        info!(
            tenant_id = %tenant_id,
            created = created,
            updated = saved.len() - created,
            "[MEMORY] Recurring patterns saved"
        );
        Ok(saved)
    }

    async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<RecurringPattern>, AppError> {
        let state = self.state.read().await;
        let mut patterns: Vec<RecurringPattern> = state
            .patterns
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        patterns.sort_by(|a, b| {
            a.counterparty_name
                .cmp(&b.counterparty_name)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        Ok(patterns)
    }

    async fn set_pattern_flags(
        &self,
        tenant_id: Uuid,
        pattern_id: Uuid,
        flags: PatternFlags,
    ) -> Result<Option<RecurringPattern>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .patterns
            .iter_mut()
            .find(|p| p.tenant_id == tenant_id && p.pattern_id == pattern_id)
            .map(|p| {
                p.is_confirmed = flags.is_confirmed;
                p.is_ignored = flags.is_ignored;
                p.is_paused = flags.is_paused;
                p.updated_utc = Utc::now();
                p.clone()
            }))
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn get_imported_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<ImportedInvoice>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .imported_invoices
            .get(&invoice_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn matched_transaction_ids(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<HashSet<Uuid>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.invoice_id == invoice_id)
            .map(|m| m.transaction_id)
            .collect())
    }

    async fn create_match(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        transaction_id: Uuid,
        match_type: MatchType,
        confidence: f64,
    ) -> Result<InvoicePaymentMatch, AppError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .matches
            .iter()
            .find(|m| m.invoice_id == invoice_id && m.transaction_id == transaction_id)
        {
            return Ok(existing.clone());
        }

        let row = InvoicePaymentMatch {
            match_id: Uuid::new_v4(),
            tenant_id,
            invoice_id,
            transaction_id,
            match_type: match_type.as_str().to_string(),
            confidence,
            created_utc: Utc::now(),
        };
        state.matches.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn find_invoice(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<Option<InvoiceRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .find_invoice(tenant_id, contract_id, billing_date)
            .cloned())
    }

    async fn create_invoice(
        &self,
        tenant_id: Uuid,
        draft: &InvoiceDraft,
        issue_date: NaiveDate,
        actor: &Actor,
    ) -> Result<InvoiceRecord, AppError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.find_invoice(tenant_id, draft.contract_id, draft.billing_date) {
            return Ok(existing.clone());
        }

        let scheme = state
            .schemes
            .get(&tenant_id)
            .cloned()
            .unwrap_or_else(|| NumberingScheme::default_for(tenant_id));
        let assigned = next_number(&scheme, issue_date);

        // Same rule as the unique (tenant_id, invoice_number) constraint.
        if state
            .invoices
            .iter()
            .any(|i| i.tenant_id == tenant_id && i.invoice_number == assigned.number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already in use",
                assigned.number
            )));
        }

        state.schemes.insert(
            tenant_id,
            NumberingScheme {
                counter: assigned.counter,
                last_reset_date: Some(assigned.last_reset_date),
                updated_utc: Utc::now(),
                ..scheme
            },
        );

        let invoice = InvoiceRecord {
            invoice_id: Uuid::new_v4(),
            tenant_id,
            contract_id: draft.contract_id,
            customer_id: draft.customer_id,
            invoice_number: assigned.number,
            billing_date: draft.billing_date,
            total_amount: draft.total_amount,
            status: InvoiceStatus::Draft.as_str().to_string(),
            created_by: actor.name.clone(),
            created_utc: Utc::now(),
        };

        for (position, line) in draft.lines.iter().enumerate() {
            state.lines.push(InvoiceLine {
                line_id: Uuid::new_v4(),
                invoice_id: invoice.invoice_id,
                position: position as i32 + 1,
                item_id: line.item_id,
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                amount: line.amount,
                is_prorated: line.is_prorated,
                prorate_factor: line.prorate_factor,
                is_one_off: line.is_one_off,
            });
        }
        state.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn list_invoice_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, AppError> {
        let state = self.state.read().await;
        let owned = state
            .invoices
            .iter()
            .any(|i| i.tenant_id == tenant_id && i.invoice_id == invoice_id);
        if !owned {
            return Ok(Vec::new());
        }
        let mut lines: Vec<InvoiceLine> = state
            .lines
            .iter()
            .filter(|l| l.invoice_id == invoice_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.position);
        Ok(lines)
    }

    async fn get_numbering_scheme(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<NumberingScheme>, AppError> {
        Ok(self.state.read().await.schemes.get(&tenant_id).cloned())
    }

    async fn configure_numbering_scheme(
        &self,
        tenant_id: Uuid,
        pattern: &str,
        reset_period: ResetPeriod,
    ) -> Result<NumberingScheme, AppError> {
        let mut state = self.state.write().await;
        let scheme = state
            .schemes
            .entry(tenant_id)
            .or_insert_with(|| NumberingScheme::default_for(tenant_id));
        scheme.pattern = pattern.to_string();
        scheme.reset_period = reset_period.as_str().to_string();
        scheme.updated_utc = Utc::now();
        Ok(scheme.clone())
    }
}
