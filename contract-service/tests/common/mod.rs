//! Common test utilities for contract-service integration tests.
//!
//! Most tests run the services against [`InMemoryStore`]. [`PostgresApp`]
//! runs the full application against PostgreSQL in an isolated schema and
//! is only available when `TEST_DATABASE_URL` is set.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use contract_service::config::{
    ContractServiceConfig, DatabaseConfig, MatchingConfig, WorkerConfig,
};
use contract_service::matching::{PaymentMatcher, DEFAULT_DAYS_AFTER};
use contract_service::models::{
    BankTransaction, Contract, ContractItem, ContractItemPrice, ImportedInvoice, Product,
};
use contract_service::services::{
    init_metrics, ContractService, Database, InMemoryStore, InvoiceService, PatternService,
    PaymentMatchingService,
};
use contract_service::startup::{AppState, Application};
use rust_decimal::Decimal;
use service_core::config::Config as CoreConfig;
use service_core::observability::init_test_tracing;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

// Counter for unique schema names
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| init_test_tracing("info,contract_service=debug"));
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Services wired to one in-memory store, plus a fresh tenant.
pub struct TestApp {
    pub store: InMemoryStore,
    pub tenant_id: Uuid,
    pub contracts: ContractService,
    pub patterns: PatternService,
    pub payments: PaymentMatchingService,
    pub invoices: InvoiceService,
}

pub fn spawn_app() -> TestApp {
    init_tracing();

    let store = InMemoryStore::new();
    let shared = Arc::new(store.clone());
    let contracts = ContractService::new(shared.clone());
    let patterns = PatternService::new(shared.clone());
    let payments = PaymentMatchingService::new(
        shared.clone(),
        shared.clone(),
        PaymentMatcher::default(),
        DEFAULT_DAYS_AFTER,
    );
    let invoices = InvoiceService::new(contracts.clone(), shared);

    TestApp {
        store,
        tenant_id: Uuid::new_v4(),
        contracts,
        patterns,
        payments,
        invoices,
    }
}

impl TestApp {
    pub async fn seed_contract(&self, start: NaiveDate, interval: &str) -> Contract {
        let contract = contract(self.tenant_id, start, interval);
        self.store.insert_contract(contract.clone()).await;
        contract
    }

    /// Recurring monthly-priced item with a named product.
    pub async fn seed_item(
        &self,
        contract: &Contract,
        name: &str,
        quantity: i32,
        unit_price: Decimal,
    ) -> ContractItem {
        let product = Product {
            product_id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: name.to_string(),
        };
        let item = item(contract, product.product_id, quantity, unit_price);
        self.store.insert_product(product).await;
        self.store.insert_item(item.clone()).await;
        item
    }

    pub async fn save_item(&self, item: &ContractItem) {
        self.store.insert_item(item.clone()).await;
    }

    pub async fn seed_price(
        &self,
        item: &ContractItem,
        from: NaiveDate,
        to: Option<NaiveDate>,
        unit_price: Decimal,
    ) -> ContractItemPrice {
        let price = ContractItemPrice {
            price_id: Uuid::new_v4(),
            item_id: item.item_id,
            tenant_id: self.tenant_id,
            valid_from: from,
            valid_to: to,
            unit_price,
            price_period: "monthly".to_string(),
            source: "fixed".to_string(),
            created_utc: Utc::now(),
        };
        self.store.insert_price(price.clone()).await;
        price
    }

    pub async fn seed_transaction(
        &self,
        booking_date: NaiveDate,
        amount: Decimal,
        counterparty: Option<&Counterparty>,
        booking_text: &str,
    ) -> BankTransaction {
        let tx = transaction(self.tenant_id, booking_date, amount, counterparty, booking_text);
        self.store.insert_transaction(tx.clone()).await;
        tx
    }

    pub async fn seed_imported_invoice(
        &self,
        invoice_number: &str,
        invoice_date: Option<NaiveDate>,
        customer_id: Option<Uuid>,
        total_amount: Decimal,
    ) -> ImportedInvoice {
        let invoice = ImportedInvoice {
            invoice_id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            invoice_number: invoice_number.to_string(),
            invoice_date,
            customer_id,
            total_amount,
            created_utc: Utc::now(),
        };
        self.store.insert_imported_invoice(invoice.clone()).await;
        invoice
    }
}

/// Counterparty data joined onto a bank transaction.
#[derive(Debug, Clone)]
pub struct Counterparty {
    pub id: Uuid,
    pub name: String,
    pub iban: Option<String>,
    pub customer_id: Option<Uuid>,
}

impl Counterparty {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            iban: None,
            customer_id: None,
        }
    }

    pub fn linked_to(mut self, customer_id: Uuid) -> Self {
        self.customer_id = Some(customer_id);
        self
    }
}

pub fn contract(tenant_id: Uuid, start: NaiveDate, interval: &str) -> Contract {
    Contract {
        contract_id: Uuid::new_v4(),
        tenant_id,
        customer_id: Uuid::new_v4(),
        name: "Managed hosting".to_string(),
        status: "active".to_string(),
        start_date: start,
        end_date: None,
        billing_start_date: Some(start),
        billing_interval: interval.to_string(),
        billing_anchor_day: 1,
        billing_alignment_date: None,
        min_duration_months: 0,
        notice_period_months: 3,
        notice_period_anchor: "end_of_duration".to_string(),
        notice_period_after_min_months: None,
        cancelled_at: None,
        cancellation_effective_date: None,
        cancellation_reason: None,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

pub fn item(
    contract: &Contract,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
) -> ContractItem {
    ContractItem {
        item_id: Uuid::new_v4(),
        contract_id: contract.contract_id,
        tenant_id: contract.tenant_id,
        product_id: Some(product_id),
        description: None,
        quantity,
        unit_price,
        price_period: "monthly".to_string(),
        start_date: None,
        billing_start_date: None,
        billing_end_date: None,
        align_to_contract_at: None,
        is_one_off: false,
        price_locked: false,
        price_locked_until: None,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

pub fn transaction(
    tenant_id: Uuid,
    booking_date: NaiveDate,
    amount: Decimal,
    counterparty: Option<&Counterparty>,
    booking_text: &str,
) -> BankTransaction {
    BankTransaction {
        transaction_id: Uuid::new_v4(),
        tenant_id,
        booking_date,
        amount,
        booking_text: booking_text.to_string(),
        counterparty_id: counterparty.map(|c| c.id),
        counterparty_name: counterparty.map(|c| c.name.clone()),
        counterparty_iban: counterparty.and_then(|c| c.iban.clone()),
        counterparty_customer_id: counterparty.and_then(|c| c.customer_id),
        created_utc: Utc::now(),
    }
}

// ============================================================================
// PostgreSQL-backed application
// ============================================================================

/// Database URL for PostgreSQL tests, if configured.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

fn unique_schema_name() -> String {
    let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test_contract_{}_{}", std::process::id(), counter)
}

/// Full application on a random port, backed by its own schema.
pub struct PostgresApp {
    pub http_address: String,
    pub state: AppState,
    pub tenant_id: Uuid,
    base_url: String,
    schema_name: String,
}

impl PostgresApp {
    /// Spawn the application. Returns `None` when no test database is
    /// configured.
    pub async fn spawn() -> Option<Self> {
        init_tracing();
        init_metrics();

        let Some(base_url) = test_database_url() else {
            eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        };
        let schema_name = unique_schema_name();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");
        pool.close().await;

        let separator = if base_url.contains('?') { "&" } else { "?" };
        let db_url_with_schema = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );

        let config = ContractServiceConfig {
            common: CoreConfig { port: 0 },
            service_name: "contract-service-test".to_string(),
            service_version: "0.1.0".to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: db_url_with_schema,
                max_connections: 5,
                min_connections: 1,
            },
            workers: WorkerConfig {
                pattern_refresh_interval_secs: 0,
            },
            matching: MatchingConfig {
                days_after: DEFAULT_DAYS_AFTER,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let http_port = app.http_port();
        let state = app.state().clone();
        let http_address = format!("http://127.0.0.1:{}", http_port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        Some(Self {
            http_address,
            state,
            tenant_id: Uuid::new_v4(),
            base_url,
            schema_name,
        })
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub async fn seed_contract(&self, start: NaiveDate, interval: &str) -> Contract {
        let c = contract(self.tenant_id, start, interval);
        sqlx::query(
            r#"
            INSERT INTO contracts (contract_id, tenant_id, customer_id, name, status, start_date,
                billing_start_date, billing_interval, billing_anchor_day, min_duration_months,
                notice_period_months, notice_period_anchor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(c.contract_id)
        .bind(c.tenant_id)
        .bind(c.customer_id)
        .bind(&c.name)
        .bind(&c.status)
        .bind(c.start_date)
        .bind(c.billing_start_date)
        .bind(&c.billing_interval)
        .bind(c.billing_anchor_day)
        .bind(c.min_duration_months)
        .bind(c.notice_period_months)
        .bind(&c.notice_period_anchor)
        .execute(self.db().pool())
        .await
        .expect("Failed to insert contract");
        c
    }

    pub async fn seed_item(
        &self,
        contract: &Contract,
        name: &str,
        quantity: i32,
        unit_price: Decimal,
    ) -> ContractItem {
        let product_id = Uuid::new_v4();
        sqlx::query("INSERT INTO products (product_id, tenant_id, name) VALUES ($1, $2, $3)")
            .bind(product_id)
            .bind(self.tenant_id)
            .bind(name)
            .execute(self.db().pool())
            .await
            .expect("Failed to insert product");

        let i = item(contract, product_id, quantity, unit_price);
        sqlx::query(
            r#"
            INSERT INTO contract_items (item_id, contract_id, tenant_id, product_id, quantity,
                unit_price, price_period)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(i.item_id)
        .bind(i.contract_id)
        .bind(i.tenant_id)
        .bind(i.product_id)
        .bind(i.quantity)
        .bind(i.unit_price)
        .bind(&i.price_period)
        .execute(self.db().pool())
        .await
        .expect("Failed to insert contract item");
        i
    }

    /// Insert a bank transaction from `counterparty_id`, creating the
    /// counterparty row on first use.
    pub async fn seed_transaction(
        &self,
        counterparty_id: Uuid,
        counterparty_name: &str,
        booking_date: NaiveDate,
        amount: Decimal,
    ) -> Uuid {
        sqlx::query(
            "INSERT INTO counterparties (counterparty_id, tenant_id, name) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(counterparty_id)
        .bind(self.tenant_id)
        .bind(counterparty_name)
        .execute(self.db().pool())
        .await
        .expect("Failed to insert counterparty");

        let transaction_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO bank_transactions (transaction_id, tenant_id, booking_date, amount, booking_text, counterparty_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transaction_id)
        .bind(self.tenant_id)
        .bind(booking_date)
        .bind(amount)
        .bind(format!("Lastschrift {}", counterparty_name))
        .bind(counterparty_id)
        .execute(self.db().pool())
        .await
        .expect("Failed to insert bank transaction");
        transaction_id
    }

    /// Drop the test schema.
    pub async fn cleanup(&self) {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.base_url)
            .await
            .ok();

        if let Some(pool) = pool {
            let _ = sqlx::query(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                self.schema_name
            ))
            .execute(&pool)
            .await;
            pool.close().await;
        }
    }
}
