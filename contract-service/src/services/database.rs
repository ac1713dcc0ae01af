//! Database service for contract-service.

use crate::billing::price::validate_price_period;
use crate::error::DomainError;
use crate::invoicing::next_number;
use crate::models::{
    Actor, BankTransaction, Contract, ContractAmendment, ContractItem, ContractItemPrice,
    ImportedInvoice, InvoiceDraft, InvoiceLine, InvoicePaymentMatch, InvoiceRecord, InvoiceStatus,
    MatchType, NewAmendment, NewItemPrice, NumberingScheme, PatternFlags, Product, RecurringPattern,
    ResetPeriod, DEFAULT_NUMBER_PATTERN,
};
use crate::patterns::DetectedPattern;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{ContractStore, InvoiceStore, PaymentStore, TransactionStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const CONTRACT_COLUMNS: &str = "contract_id, tenant_id, customer_id, name, status, start_date, end_date, \
     billing_start_date, billing_interval, billing_anchor_day, billing_alignment_date, \
     min_duration_months, notice_period_months, notice_period_anchor, notice_period_after_min_months, \
     cancelled_at, cancellation_effective_date, cancellation_reason, created_utc, updated_utc";

const ITEM_COLUMNS: &str = "item_id, contract_id, tenant_id, product_id, description, quantity, unit_price, \
     price_period, start_date, billing_start_date, billing_end_date, align_to_contract_at, is_one_off, \
     price_locked, price_locked_until, created_utc, updated_utc";

const PRICE_COLUMNS: &str =
    "price_id, item_id, tenant_id, valid_from, valid_to, unit_price, price_period, source, created_utc";

const PATTERN_COLUMNS: &str = "pattern_id, tenant_id, counterparty_key, counterparty_id, counterparty_name, \
     average_amount, frequency, day_of_month, confidence_score, is_confirmed, is_ignored, is_paused, \
     last_occurrence, source_transaction_ids, created_utc, updated_utc";

const TRANSACTION_SELECT: &str = "SELECT t.transaction_id, t.tenant_id, t.booking_date, t.amount, t.booking_text, \
     t.counterparty_id, c.name AS counterparty_name, c.iban AS counterparty_iban, \
     c.customer_id AS counterparty_customer_id, t.created_utc \
     FROM bank_transactions t LEFT JOIN counterparties c ON c.counterparty_id = t.counterparty_id";

const INVOICE_COLUMNS: &str = "invoice_id, tenant_id, contract_id, customer_id, invoice_number, billing_date, \
     total_amount, status, created_by, created_utc";

const SCHEME_COLUMNS: &str = "tenant_id, pattern, counter, reset_period, last_reset_date, updated_utc";

const MATCH_COLUMNS: &str =
    "match_id, tenant_id, invoice_id, transaction_id, match_type, confidence, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "contract-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

async fn insert_amendment(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    amendment: &NewAmendment,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO contract_amendments (amendment_id, tenant_id, contract_id, item_id, amendment_type, changes, actor_user_id, actor_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(amendment.contract_id)
    .bind(amendment.item_id)
    .bind(amendment.amendment_type.as_str())
    .bind(amendment.changes_json())
    .bind(amendment.actor.user_id)
    .bind(&amendment.actor.name)
    .execute(conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert amendment: {}", e)))?;
    Ok(())
}

// =========================================================================
// Contracts
// =========================================================================

#[async_trait]
impl ContractStore for Database {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, contract_id = %contract_id))]
    async fn get_contract(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Option<Contract>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_contract"])
            .start_timer();

        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {} FROM contracts WHERE tenant_id = $1 AND contract_id = $2",
            CONTRACT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get contract: {}", e)))?;

        timer.observe_duration();
        Ok(contract)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_contracts(&self, tenant_id: Uuid) -> Result<Vec<Contract>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_contracts"])
            .start_timer();

        let contracts = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {} FROM contracts WHERE tenant_id = $1 AND status <> 'deleted' ORDER BY start_date, contract_id",
            CONTRACT_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list contracts: {}", e)))?;

        timer.observe_duration();
        Ok(contracts)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, contract_id = %contract_id))]
    async fn list_items(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<ContractItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let items = sqlx::query_as::<_, ContractItem>(&format!(
            "SELECT {} FROM contract_items WHERE tenant_id = $1 AND contract_id = $2 ORDER BY created_utc, item_id",
            ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list items: {}", e)))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id))]
    async fn get_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<ContractItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_item"])
            .start_timer();

        let item = sqlx::query_as::<_, ContractItem>(&format!(
            "SELECT {} FROM contract_items WHERE tenant_id = $1 AND item_id = $2",
            ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get item: {}", e)))?;

        timer.observe_duration();
        Ok(item)
    }

    #[instrument(skip(self, item_ids), fields(tenant_id = %tenant_id, items = item_ids.len()))]
    async fn list_item_prices(
        &self,
        tenant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ContractItemPrice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_item_prices"])
            .start_timer();

        let prices = sqlx::query_as::<_, ContractItemPrice>(&format!(
            "SELECT {} FROM contract_item_prices WHERE tenant_id = $1 AND item_id = ANY($2) ORDER BY item_id, valid_from",
            PRICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list item prices: {}", e)))?;

        timer.observe_duration();
        Ok(prices)
    }

    #[instrument(skip(self, product_ids), fields(tenant_id = %tenant_id))]
    async fn product_names(
        &self,
        tenant_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["product_names"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(
            "SELECT product_id, tenant_id, name FROM products WHERE tenant_id = $1 AND product_id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load products: {}", e)))?;

        timer.observe_duration();
        Ok(products.into_iter().map(|p| (p.product_id, p.name)).collect())
    }

    #[instrument(skip(self, item, amendment), fields(tenant_id = %tenant_id, item_id = %item.item_id))]
    async fn update_item(
        &self,
        tenant_id: Uuid,
        item: &ContractItem,
        amendment: &NewAmendment,
    ) -> Result<ContractItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = sqlx::query_as::<_, ContractItem>(&format!(
            r#"
            UPDATE contract_items
            SET quantity = $3, unit_price = $4, price_period = $5, start_date = $6,
                billing_start_date = $7, billing_end_date = $8, align_to_contract_at = $9,
                is_one_off = $10, price_locked = $11, price_locked_until = $12, updated_utc = NOW()
            WHERE tenant_id = $1 AND item_id = $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(item.item_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(&item.price_period)
        .bind(item.start_date)
        .bind(item.billing_start_date)
        .bind(item.billing_end_date)
        .bind(item.align_to_contract_at)
        .bind(item.is_one_off)
        .bind(item.price_locked)
        .bind(item.price_locked_until)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update item: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Item {} not found", item.item_id)))?;

        insert_amendment(&mut *tx, tenant_id, amendment).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(item_id = %updated.item_id, "Contract item updated");
        Ok(updated)
    }

    #[instrument(skip(self, price, amendment), fields(tenant_id = %tenant_id, item_id = %item_id))]
    async fn insert_price_period(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        price: &NewItemPrice,
        amendment: &NewAmendment,
    ) -> Result<ContractItemPrice, DomainError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_price_period"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Serializes concurrent period inserts for the same item.
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT item_id FROM contract_items WHERE tenant_id = $1 AND item_id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock item: {}", e)))?;
        if locked.is_none() {
            return Err(DomainError::ItemNotFound(item_id));
        }

        let existing = sqlx::query_as::<_, ContractItemPrice>(&format!(
            "SELECT {} FROM contract_item_prices WHERE tenant_id = $1 AND item_id = $2",
            PRICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(item_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load price periods: {}", e)))?;

        validate_price_period(&existing, price)?;

        let inserted = sqlx::query_as::<_, ContractItemPrice>(&format!(
            r#"
            INSERT INTO contract_item_prices (price_id, item_id, tenant_id, valid_from, valid_to, unit_price, price_period, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRICE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(item_id)
        .bind(tenant_id)
        .bind(price.valid_from)
        .bind(price.valid_to)
        .bind(price.unit_price)
        .bind(price.price_period.as_str())
        .bind(price.source.as_str())
        .fetch_one(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                tx.rollback().await.ok();
                return Err(DomainError::MultipleOpenEndedPeriods);
            }
            Err(e) => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to insert price period: {}",
                    e
                ))
                .into());
            }
        };

        insert_amendment(&mut *tx, tenant_id, amendment).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(price_id = %inserted.price_id, valid_from = %inserted.valid_from, "Price period added");
        Ok(inserted)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, contract_id = %contract_id))]
    async fn list_amendments(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<ContractAmendment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_amendments"])
            .start_timer();

        let amendments = sqlx::query_as::<_, ContractAmendment>(
            r#"
            SELECT amendment_id, tenant_id, contract_id, item_id, amendment_type, changes, actor_user_id, actor_name, created_utc
            FROM contract_amendments
            WHERE tenant_id = $1 AND contract_id = $2
            ORDER BY created_utc, amendment_id
            "#,
        )
        .bind(tenant_id)
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list amendments: {}", e)))?;

        timer.observe_duration();
        Ok(amendments)
    }
}

// =========================================================================
// Bank transactions and recurring patterns
// =========================================================================

#[async_trait]
impl TransactionStore for Database {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_transactions(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, BankTransaction>(&format!(
            "{} WHERE t.tenant_id = $1 AND t.booking_date BETWEEN $2 AND $3 ORDER BY t.booking_date, t.transaction_id",
            TRANSACTION_SELECT
        ))
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e)))?;

        timer.observe_duration();
        Ok(transactions)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transaction_id = %transaction_id))]
    async fn get_transaction(
        &self,
        tenant_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<BankTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, BankTransaction>(&format!(
            "{} WHERE t.tenant_id = $1 AND t.transaction_id = $2",
            TRANSACTION_SELECT
        ))
        .bind(tenant_id)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e)))?;

        timer.observe_duration();
        Ok(transaction)
    }

    #[instrument(skip(self))]
    async fn tenants_with_transactions(&self) -> Result<Vec<Uuid>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["tenants_with_transactions"])
            .start_timer();

        let tenants = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tenant_id FROM bank_transactions ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tenants: {}", e)))?;

        timer.observe_duration();
        Ok(tenants)
    }

    #[instrument(skip(self, patterns), fields(tenant_id = %tenant_id, patterns = patterns.len()))]
    async fn upsert_patterns(
        &self,
        tenant_id: Uuid,
        patterns: &[DetectedPattern],
    ) -> Result<Vec<RecurringPattern>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_patterns"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let mut saved = Vec::with_capacity(patterns.len());
        let mut created = 0usize;

        for pattern in patterns {
            let row = sqlx::query_as::<_, RecurringPattern>(&format!(
                r#"
                INSERT INTO recurring_patterns (pattern_id, tenant_id, counterparty_key, counterparty_id, counterparty_name,
                    average_amount, frequency, day_of_month, confidence_score, last_occurrence, source_transaction_ids)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (tenant_id, counterparty_key, (sign(average_amount))) DO UPDATE
                SET counterparty_id = EXCLUDED.counterparty_id,
                    counterparty_name = EXCLUDED.counterparty_name,
                    average_amount = EXCLUDED.average_amount,
                    frequency = EXCLUDED.frequency,
                    day_of_month = EXCLUDED.day_of_month,
                    confidence_score = EXCLUDED.confidence_score,
                    last_occurrence = EXCLUDED.last_occurrence,
                    source_transaction_ids = EXCLUDED.source_transaction_ids,
                    updated_utc = NOW()
                RETURNING {}
                "#,
                PATTERN_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(&pattern.counterparty_key)
            .bind(pattern.counterparty_id)
            .bind(&pattern.counterparty_name)
            .bind(pattern.average_amount)
            .bind(pattern.frequency.as_str())
            .bind(pattern.day_of_month)
            .bind(pattern.confidence_score)
            .bind(pattern.last_occurrence)
            .bind(&pattern.transaction_ids)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save pattern: {}", e)))?;

            // NOW() is fixed per transaction, so only fresh rows have equal timestamps.
            if row.created_utc == row.updated_utc {
                created += 1;
            }
            saved.push(row);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            created = created,
            updated = saved.len() - created,
            "Recurring patterns saved"
        );
        Ok(saved)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<RecurringPattern>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_patterns"])
            .start_timer();

        let patterns = sqlx::query_as::<_, RecurringPattern>(&format!(
            "SELECT {} FROM recurring_patterns WHERE tenant_id = $1 ORDER BY counterparty_name, pattern_id",
            PATTERN_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list patterns: {}", e)))?;

        timer.observe_duration();
        Ok(patterns)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, pattern_id = %pattern_id))]
    async fn set_pattern_flags(
        &self,
        tenant_id: Uuid,
        pattern_id: Uuid,
        flags: PatternFlags,
    ) -> Result<Option<RecurringPattern>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_pattern_flags"])
            .start_timer();

        let pattern = sqlx::query_as::<_, RecurringPattern>(&format!(
            r#"
            UPDATE recurring_patterns
            SET is_confirmed = $3, is_ignored = $4, is_paused = $5, updated_utc = NOW()
            WHERE tenant_id = $1 AND pattern_id = $2
            RETURNING {}
            "#,
            PATTERN_COLUMNS
        ))
        .bind(tenant_id)
        .bind(pattern_id)
        .bind(flags.is_confirmed)
        .bind(flags.is_ignored)
        .bind(flags.is_paused)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update pattern flags: {}", e)))?;

        timer.observe_duration();
        Ok(pattern)
    }
}

// =========================================================================
// Payment matches
// =========================================================================

#[async_trait]
impl PaymentStore for Database {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn get_imported_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<ImportedInvoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_imported_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, ImportedInvoice>(
            r#"
            SELECT invoice_id, tenant_id, invoice_number, invoice_date, customer_id, total_amount, created_utc
            FROM imported_invoices
            WHERE tenant_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn matched_transaction_ids(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<HashSet<Uuid>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["matched_transaction_ids"])
            .start_timer();

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT transaction_id FROM invoice_payment_matches WHERE tenant_id = $1 AND invoice_id = $2",
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list matches: {}", e)))?;

        timer.observe_duration();
        Ok(ids.into_iter().collect())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id, transaction_id = %transaction_id))]
    async fn create_match(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        transaction_id: Uuid,
        match_type: MatchType,
        confidence: f64,
    ) -> Result<InvoicePaymentMatch, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_match"])
            .start_timer();

        let inserted = sqlx::query_as::<_, InvoicePaymentMatch>(&format!(
            r#"
            INSERT INTO invoice_payment_matches (match_id, tenant_id, invoice_id, transaction_id, match_type, confidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (invoice_id, transaction_id) DO NOTHING
            RETURNING {}
            "#,
            MATCH_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(transaction_id)
        .bind(match_type.as_str())
        .bind(confidence)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create match: {}", e)))?;

        let row = match inserted {
            Some(row) => {
                info!(match_id = %row.match_id, match_type = %row.match_type, "Payment match created");
                row
            }
            None => sqlx::query_as::<_, InvoicePaymentMatch>(&format!(
                "SELECT {} FROM invoice_payment_matches WHERE tenant_id = $1 AND invoice_id = $2 AND transaction_id = $3",
                MATCH_COLUMNS
            ))
            .bind(tenant_id)
            .bind(invoice_id)
            .bind(transaction_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch existing match: {}", e)))?,
        };

        timer.observe_duration();
        Ok(row)
    }
}

// =========================================================================
// Generated invoices and numbering
// =========================================================================

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, contract_id = %contract_id))]
    async fn find_invoice(
        &self,
        tenant_id: Uuid,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<Option<InvoiceRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM invoices WHERE tenant_id = $1 AND contract_id = $2 AND billing_date = $3",
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(contract_id)
        .bind(billing_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self, draft, actor), fields(tenant_id = %tenant_id, contract_id = %draft.contract_id, billing_date = %draft.billing_date))]
    async fn create_invoice(
        &self,
        tenant_id: Uuid,
        draft: &InvoiceDraft,
        issue_date: NaiveDate,
        actor: &Actor,
    ) -> Result<InvoiceRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            "INSERT INTO invoice_numbering_schemes (tenant_id, pattern) VALUES ($1, $2) ON CONFLICT (tenant_id) DO NOTHING",
        )
        .bind(tenant_id)
        .bind(DEFAULT_NUMBER_PATTERN)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to ensure numbering scheme: {}", e)))?;

        // Held until commit; serializes number assignment per tenant.
        let scheme = sqlx::query_as::<_, NumberingScheme>(&format!(
            "SELECT {} FROM invoice_numbering_schemes WHERE tenant_id = $1 FOR UPDATE",
            SCHEME_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock numbering scheme: {}", e)))?;

        let existing = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM invoices WHERE tenant_id = $1 AND contract_id = $2 AND billing_date = $3",
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(draft.contract_id)
        .bind(draft.billing_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check existing invoice: {}", e)))?;

        if let Some(invoice) = existing {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(invoice);
        }

        let assigned = next_number(&scheme, issue_date);

        sqlx::query(
            "UPDATE invoice_numbering_schemes SET counter = $2, last_reset_date = $3, updated_utc = NOW() WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .bind(assigned.counter)
        .bind(assigned.last_reset_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to advance counter: {}", e)))?;

        let invoice = sqlx::query_as::<_, InvoiceRecord>(&format!(
            r#"
            INSERT INTO invoices (invoice_id, tenant_id, contract_id, customer_id, invoice_number, billing_date, total_amount, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(draft.contract_id)
        .bind(draft.customer_id)
        .bind(&assigned.number)
        .bind(draft.billing_date)
        .bind(draft.total_amount)
        .bind(InvoiceStatus::Draft.as_str())
        .bind(&actor.name)
        .fetch_one(&mut *tx)
        .await;

        let invoice = match invoice {
            Ok(row) => row,
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                tx.rollback().await.ok();
                warn!(number = %assigned.number, "Invoice insert conflicted, returning existing invoice");
                let existing = self
                    .find_invoice(tenant_id, draft.contract_id, draft.billing_date)
                    .await?;
                return existing.ok_or_else(|| {
                    AppError::Conflict(anyhow::anyhow!(
                        "Invoice number {} already in use",
                        assigned.number
                    ))
                });
            }
            Err(e) => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to insert invoice: {}",
                    e
                )));
            }
        };

        for (position, line) in draft.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (line_id, invoice_id, position, item_id, description, quantity, unit_price, amount, is_prorated, prorate_factor, is_one_off)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(position as i32 + 1)
            .bind(line.item_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.amount)
            .bind(line.is_prorated)
            .bind(line.prorate_factor)
            .bind(line.is_one_off)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice line: {}", e)))?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );
        Ok(invoice)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn list_invoice_lines(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLine>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoice_lines"])
            .start_timer();

        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT l.line_id, l.invoice_id, l.position, l.item_id, l.description, l.quantity, l.unit_price,
                   l.amount, l.is_prorated, l.prorate_factor, l.is_one_off
            FROM invoice_lines l
            JOIN invoices i ON i.invoice_id = l.invoice_id
            WHERE i.tenant_id = $1 AND l.invoice_id = $2
            ORDER BY l.position
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoice lines: {}", e)))?;

        timer.observe_duration();
        Ok(lines)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_numbering_scheme(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<NumberingScheme>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_numbering_scheme"])
            .start_timer();

        let scheme = sqlx::query_as::<_, NumberingScheme>(&format!(
            "SELECT {} FROM invoice_numbering_schemes WHERE tenant_id = $1",
            SCHEME_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get numbering scheme: {}", e)))?;

        timer.observe_duration();
        Ok(scheme)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn configure_numbering_scheme(
        &self,
        tenant_id: Uuid,
        pattern: &str,
        reset_period: ResetPeriod,
    ) -> Result<NumberingScheme, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["configure_numbering_scheme"])
            .start_timer();

        let scheme = sqlx::query_as::<_, NumberingScheme>(&format!(
            r#"
            INSERT INTO invoice_numbering_schemes (tenant_id, pattern, reset_period)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id) DO UPDATE
            SET pattern = EXCLUDED.pattern, reset_period = EXCLUDED.reset_period, updated_utc = NOW()
            RETURNING {}
            "#,
            SCHEME_COLUMNS
        ))
        .bind(tenant_id)
        .bind(pattern)
        .bind(reset_period.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save numbering scheme: {}", e)))?;

        timer.observe_duration();
        info!(pattern = %scheme.pattern, reset_period = %scheme.reset_period, "Numbering scheme configured");
        Ok(scheme)
    }
}
