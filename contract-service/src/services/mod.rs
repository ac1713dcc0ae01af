//! Services module for contract-service.

pub mod contracts;
pub mod database;
pub mod invoices;
pub mod memory;
pub mod metrics;
pub mod patterns;
pub mod payments;
pub mod store;

pub use contracts::ContractService;
pub use database::Database;
pub use invoices::InvoiceService;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics, record_error};
pub use patterns::{PatternService, RefreshSummary};
pub use payments::PaymentMatchingService;
pub use store::{ContractStore, InvoiceStore, PaymentStore, TransactionStore};
