//! Bank transactions as consumed by pattern detection and payment matching.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Counterparty name used by bank imports when the payer/payee is unknown.
pub const UNKNOWN_COUNTERPARTY: &str = "(Bank Fees/Unknown)";

/// A booked bank transaction joined with its counterparty. Positive
/// amounts are credits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankTransaction {
    pub transaction_id: Uuid,
    pub tenant_id: Uuid,
    pub booking_date: NaiveDate,
    pub amount: Decimal,
    pub booking_text: String,
    pub counterparty_id: Option<Uuid>,
    pub counterparty_name: Option<String>,
    pub counterparty_iban: Option<String>,
    /// Customer the counterparty is linked to, if any.
    pub counterparty_customer_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl BankTransaction {
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Counterparty name if it identifies a real party.
    pub fn known_counterparty(&self) -> Option<&str> {
        self.counterparty_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != UNKNOWN_COUNTERPARTY)
    }
}
