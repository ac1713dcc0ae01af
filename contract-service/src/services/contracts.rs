//! Contract reads and mutations on top of a [`ContractStore`].

use crate::billing::forecast::{monthly_recurring_revenue, monthly_totals};
use crate::billing::{resolve_price, ContractBundle, ResolvedPrice, ScheduleEvent, ScheduleWindow};
use crate::error::DomainError;
use crate::models::{
    compute_diff, Actor, AmendmentType, Contract, ContractAmendment, ContractItem,
    ContractItemPrice, ContractStatus, NewAmendment, NewItemPrice, Snapshot,
};
use crate::services::metrics::{record_error, record_schedule_computation};
use crate::services::store::ContractStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ContractService {
    store: Arc<dyn ContractStore>,
}

impl ContractService {
    pub fn new(store: Arc<dyn ContractStore>) -> Self {
        Self { store }
    }

    async fn contract(&self, tenant_id: Uuid, contract_id: Uuid) -> Result<Contract, DomainError> {
        self.store
            .get_contract(tenant_id, contract_id)
            .await?
            .ok_or(DomainError::ContractNotFound(contract_id))
    }

    async fn item(&self, tenant_id: Uuid, item_id: Uuid) -> Result<ContractItem, DomainError> {
        self.store
            .get_item(tenant_id, item_id)
            .await?
            .ok_or(DomainError::ItemNotFound(item_id))
    }

    async fn bundle_for(
        &self,
        tenant_id: Uuid,
        contract: Contract,
    ) -> Result<ContractBundle, DomainError> {
        let items = self.store.list_items(tenant_id, contract.contract_id).await?;
        let item_ids: Vec<Uuid> = items.iter().map(|i| i.item_id).collect();
        let product_ids: Vec<Uuid> = items
            .iter()
            .filter_map(|i| i.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let prices = if item_ids.is_empty() {
            Vec::new()
        } else {
            self.store.list_item_prices(tenant_id, &item_ids).await?
        };
        let product_names = if product_ids.is_empty() {
            Default::default()
        } else {
            self.store.product_names(tenant_id, &product_ids).await?
        };

        Ok(ContractBundle {
            contract,
            items,
            prices,
            product_names,
        })
    }

    /// Contract with its items, price periods and product names, loaded once
    /// for schedule computations.
    pub async fn load_bundle(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<ContractBundle, DomainError> {
        let contract = self.contract(tenant_id, contract_id).await?;
        self.bundle_for(tenant_id, contract).await
    }

    /// Bundles of every contract whose effective status on `today` is active.
    pub async fn active_bundles(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<ContractBundle>, DomainError> {
        let contracts = self.store.list_contracts(tenant_id).await?;
        let mut bundles = Vec::new();
        for contract in contracts
            .into_iter()
            .filter(|c| c.effective_status(today) == ContractStatus::Active)
        {
            bundles.push(self.bundle_for(tenant_id, contract).await?);
        }
        Ok(bundles)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, contract_id = %contract_id))]
    pub async fn billing_schedule(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        window: ScheduleWindow,
    ) -> Result<Vec<ScheduleEvent>, DomainError> {
        let bundle = self.load_bundle(tenant_id, contract_id).await?;
        record_schedule_computation("billing");
        Ok(bundle.billing_schedule(&window))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, contract_id = %contract_id))]
    pub async fn recognition_schedule(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        window: ScheduleWindow,
    ) -> Result<Vec<ScheduleEvent>, DomainError> {
        let bundle = self.load_bundle(tenant_id, contract_id).await?;
        record_schedule_computation("recognition");
        Ok(bundle.recognition_schedule(&window))
    }

    /// Resolve an item's price against its persisted periods.
    pub async fn resolve_price(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Result<ResolvedPrice, DomainError> {
        let item = self.item(tenant_id, item_id).await?;
        let periods = self.store.list_item_prices(tenant_id, &[item_id]).await?;
        Ok(resolve_price(&item, date, &periods))
    }

    pub async fn resolve_monthly_price(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Result<Decimal, DomainError> {
        Ok(self.resolve_price(tenant_id, item_id, date).await?.monthly())
    }

    async fn save_item(
        &self,
        tenant_id: Uuid,
        before: &ContractItem,
        after: ContractItem,
        actor: &Actor,
    ) -> Result<ContractItem, DomainError> {
        let changes = compute_diff(&before.snapshot(), &after.snapshot());
        if changes.is_empty() {
            return Ok(after);
        }
        let amendment = NewAmendment {
            contract_id: before.contract_id,
            item_id: Some(before.item_id),
            amendment_type: AmendmentType::ItemUpdated,
            changes,
            actor: actor.clone(),
        };
        let saved = self.store.update_item(tenant_id, &after, &amendment).await?;
        info!(
            item_id = %saved.item_id,
            fields = ?amendment.changes.keys().collect::<Vec<_>>(),
            actor = %actor.name,
            "Contract item amended"
        );
        Ok(saved)
    }

    /// Change an item's base price. Rejected while the price lock holds.
    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id, item_id = %item_id))]
    pub async fn update_item_price(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        unit_price: Decimal,
        actor: &Actor,
        today: NaiveDate,
    ) -> Result<ContractItem, DomainError> {
        let item = self.item(tenant_id, item_id).await?;
        if item.is_price_locked(today) {
            warn!(until = ?item.price_locked_until, "Price change rejected, item is locked");
            record_error("price_locked");
            return Err(DomainError::PriceLocked {
                item_id,
                until: item.price_locked_until,
            });
        }
        if unit_price.is_sign_negative() {
            return Err(DomainError::InvalidPricePeriod(
                "unit_price must not be negative".to_string(),
            ));
        }

        let updated = ContractItem {
            unit_price,
            ..item.clone()
        };
        self.save_item(tenant_id, &item, updated, actor).await
    }

    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id, item_id = %item_id))]
    pub async fn update_item_quantity(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        actor: &Actor,
    ) -> Result<ContractItem, DomainError> {
        if quantity <= 0 {
            warn!(quantity = quantity, "Quantity change rejected");
            return Err(DomainError::InvalidQuantity(quantity));
        }
        let item = self.item(tenant_id, item_id).await?;
        let updated = ContractItem {
            quantity,
            ..item.clone()
        };
        self.save_item(tenant_id, &item, updated, actor).await
    }

    /// Add a dated price to an item. Overlaps and a second open-ended period
    /// are rejected by the store inside the insert transaction.
    #[instrument(skip(self, price, actor), fields(tenant_id = %tenant_id, item_id = %item_id, valid_from = %price.valid_from))]
    pub async fn add_price_period(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        price: NewItemPrice,
        actor: &Actor,
    ) -> Result<ContractItemPrice, DomainError> {
        let item = self.item(tenant_id, item_id).await?;
        let amendment = NewAmendment {
            contract_id: item.contract_id,
            item_id: Some(item_id),
            amendment_type: AmendmentType::PricePeriodAdded,
            changes: compute_diff(&Snapshot::new(), &price.snapshot()),
            actor: actor.clone(),
        };

        match self
            .store
            .insert_price_period(tenant_id, item_id, &price, &amendment)
            .await
        {
            Ok(inserted) => Ok(inserted),
            Err(e) => {
                warn!(error = %e, "Price period rejected");
                record_error("price_period_rejected");
                Err(e)
            }
        }
    }

    pub async fn amendments(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<ContractAmendment>, DomainError> {
        Ok(self.store.list_amendments(tenant_id, contract_id).await?)
    }

    /// Recognized revenue per calendar month over all active contracts.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn revenue_forecast(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Decimal>, DomainError> {
        let window = ScheduleWindow::with_history(from, to);
        let bundles = self.active_bundles(tenant_id, today).await?;
        let events: Vec<ScheduleEvent> = bundles
            .iter()
            .flat_map(|bundle| {
                record_schedule_computation("recognition");
                bundle.recognition_schedule(&window)
            })
            .collect();
        Ok(monthly_totals(&events))
    }

    /// Monthly recurring revenue of the tenant on `date`.
    pub async fn monthly_recurring_revenue(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
    ) -> Result<Decimal, DomainError> {
        let bundles = self.active_bundles(tenant_id, date).await?;
        Ok(bundles
            .iter()
            .map(|bundle| monthly_recurring_revenue(bundle, date))
            .sum())
    }

    /// Next cycle boundary after `from`, offered as the alignment date for
    /// an item added mid-cycle.
    pub async fn suggested_alignment_date(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        from: NaiveDate,
    ) -> Result<NaiveDate, DomainError> {
        Ok(self
            .contract(tenant_id, contract_id)
            .await?
            .suggested_alignment_date(from))
    }

    pub async fn earliest_cancellation_date(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        from: NaiveDate,
    ) -> Result<NaiveDate, DomainError> {
        Ok(self
            .contract(tenant_id, contract_id)
            .await?
            .earliest_cancellation_date(from))
    }

    pub async fn effective_end_date(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        today: NaiveDate,
    ) -> Result<NaiveDate, DomainError> {
        Ok(self
            .contract(tenant_id, contract_id)
            .await?
            .effective_end_date(today))
    }
}
