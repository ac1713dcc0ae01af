//! Typed failures of contract-service operations.

use chrono::NaiveDate;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Contract {0} not found")]
    ContractNotFound(Uuid),

    #[error("Contract item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Invoice {0} not found")]
    InvoiceNotFound(Uuid),

    #[error("Transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("Recurring pattern {0} not found")]
    PatternNotFound(Uuid),

    #[error("Price of item {item_id} is locked{}", .until.map(|d| format!(" until {}", d)).unwrap_or_default())]
    PriceLocked {
        item_id: Uuid,
        until: Option<NaiveDate>,
    },

    #[error("Price period overlaps existing period {existing}")]
    OverlappingPricePeriod { existing: Uuid },

    #[error("Item already has an open-ended price period")]
    MultipleOpenEndedPeriods,

    #[error("Invalid price period: {0}")]
    InvalidPricePeriod(String),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("Invalid billing month {year}-{month}")]
    InvalidBillingMonth { year: i32, month: u32 },

    #[error("Numbering pattern {0:?} has no counter placeholder")]
    InvalidNumberingPattern(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ContractNotFound(_)
            | DomainError::ItemNotFound(_)
            | DomainError::InvoiceNotFound(_)
            | DomainError::TransactionNotFound(_)
            | DomainError::PatternNotFound(_) => AppError::NotFound(anyhow::anyhow!("{}", err)),
            DomainError::PriceLocked { .. }
            | DomainError::OverlappingPricePeriod { .. }
            | DomainError::MultipleOpenEndedPeriods => AppError::Conflict(anyhow::anyhow!("{}", err)),
            DomainError::InvalidPricePeriod(_)
            | DomainError::InvalidQuantity(_)
            | DomainError::InvalidBillingMonth { .. }
            | DomainError::InvalidNumberingPattern(_) => {
                AppError::BadRequest(anyhow::anyhow!("{}", err))
            }
            DomainError::Store(inner) => inner,
        }
    }
}
