//! Domain models for contract-service.

pub mod amendment;
pub mod contract;
pub mod contract_item;
pub mod invoice;
pub mod pattern;
pub mod transaction;

pub use amendment::{
    compute_diff, Actor, AmendmentType, ContractAmendment, FieldChange, NewAmendment, Snapshot,
};
pub use contract::{BillingInterval, Contract, ContractStatus, NoticePeriodAnchor};
pub use contract_item::{
    ContractItem, ContractItemPrice, NewItemPrice, PricePeriod, PriceSource, Product,
    ITEM_TRACKED_FIELDS,
};
pub use invoice::{
    ImportedInvoice, InvoiceDraft, InvoiceDraftLine, InvoiceLine, InvoicePaymentMatch,
    InvoiceRecord, InvoiceStatus, MatchType, NumberingScheme, ResetPeriod,
    DEFAULT_NUMBER_PATTERN,
};
pub use pattern::{AmountSign, PatternFlags, PatternFrequency, RecurringPattern};
pub use transaction::{BankTransaction, UNKNOWN_COUNTERPARTY};
