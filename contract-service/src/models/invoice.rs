//! Invoices: imported (to be matched against payments) and generated from
//! billing schedules, plus the per-tenant numbering scheme.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Imported invoices and payment matches
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImportedInvoice {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub customer_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    InvoiceNumberExact,
    InvoiceNumberNormalized,
    InvoiceNumberSuffix,
    AmountCustomer,
    Manual,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvoiceNumberExact => "invoice_number_exact",
            Self::InvoiceNumberNormalized => "invoice_number_normalized",
            Self::InvoiceNumberSuffix => "invoice_number_suffix",
            Self::AmountCustomer => "amount_customer",
            Self::Manual => "manual",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "invoice_number_exact" => Self::InvoiceNumberExact,
            "invoice_number_normalized" => Self::InvoiceNumberNormalized,
            "invoice_number_suffix" => Self::InvoiceNumberSuffix,
            "amount_customer" => Self::AmountCustomer,
            _ => Self::Manual,
        }
    }
}

/// Link between an imported invoice and the transaction that paid it.
/// Unique per (invoice, transaction).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoicePaymentMatch {
    pub match_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub transaction_id: Uuid,
    pub match_type: String,
    pub confidence: f64,
    pub created_utc: DateTime<Utc>,
}

// ============================================================================
// Numbering scheme
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPeriod {
    Never,
    Yearly,
    Monthly,
}

impl ResetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "never" => Self::Never,
            "monthly" => Self::Monthly,
            _ => Self::Yearly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NumberingScheme {
    pub tenant_id: Uuid,
    pub pattern: String,
    pub counter: i64,
    pub reset_period: String,
    pub last_reset_date: Option<NaiveDate>,
    pub updated_utc: DateTime<Utc>,
}

pub const DEFAULT_NUMBER_PATTERN: &str = "RE-{YYYY}-{NNNN}";

impl NumberingScheme {
    pub fn default_for(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            pattern: DEFAULT_NUMBER_PATTERN.to_string(),
            counter: 0,
            reset_period: ResetPeriod::Yearly.as_str().to_string(),
            last_reset_date: None,
            updated_utc: Utc::now(),
        }
    }

    pub fn reset_period(&self) -> ResetPeriod {
        ResetPeriod::from_string(&self.reset_period)
    }
}

// ============================================================================
// Generated invoices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceRecord {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub contract_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub billing_date: NaiveDate,
    pub total_amount: Decimal,
    pub status: String,
    pub created_by: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLine {
    pub line_id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub item_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub is_prorated: bool,
    pub prorate_factor: Option<Decimal>,
    pub is_one_off: bool,
}

/// Invoice ready to be numbered and stored.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub contract_id: Uuid,
    pub customer_id: Uuid,
    pub billing_date: NaiveDate,
    pub total_amount: Decimal,
    pub lines: Vec<InvoiceDraftLine>,
}

#[derive(Debug, Clone)]
pub struct InvoiceDraftLine {
    pub item_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub is_prorated: bool,
    pub prorate_factor: Option<Decimal>,
    pub is_one_off: bool,
}
