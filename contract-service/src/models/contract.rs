//! Contract model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Contract lifecycle status. `Ended` and `Deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Active,
    Paused,
    Cancelled,
    Ended,
    Deleted,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Active => "active",
            ContractStatus::Paused => "paused",
            ContractStatus::Cancelled => "cancelled",
            ContractStatus::Ended => "ended",
            ContractStatus::Deleted => "deleted",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => ContractStatus::Active,
            "paused" => ContractStatus::Paused,
            "cancelled" => ContractStatus::Cancelled,
            "ended" => ContractStatus::Ended,
            "deleted" => ContractStatus::Deleted,
            _ => ContractStatus::Draft,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Ended | ContractStatus::Deleted)
    }
}

/// Contract-level billing cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    Biennial,
    Triennial,
    Quadrennial,
    Quinquennial,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Quarterly => "quarterly",
            BillingInterval::SemiAnnual => "semi_annual",
            BillingInterval::Annual => "annual",
            BillingInterval::Biennial => "biennial",
            BillingInterval::Triennial => "triennial",
            BillingInterval::Quadrennial => "quadrennial",
            BillingInterval::Quinquennial => "quinquennial",
        }
    }

    /// Parse a stored interval. Unknown values yield `None`.
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(BillingInterval::Monthly),
            "quarterly" => Some(BillingInterval::Quarterly),
            "semi_annual" => Some(BillingInterval::SemiAnnual),
            "annual" => Some(BillingInterval::Annual),
            "biennial" => Some(BillingInterval::Biennial),
            "triennial" => Some(BillingInterval::Triennial),
            "quadrennial" => Some(BillingInterval::Quadrennial),
            "quinquennial" => Some(BillingInterval::Quinquennial),
            _ => None,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            BillingInterval::Monthly => 1,
            BillingInterval::Quarterly => 3,
            BillingInterval::SemiAnnual => 6,
            BillingInterval::Annual => 12,
            BillingInterval::Biennial => 24,
            BillingInterval::Triennial => 36,
            BillingInterval::Quadrennial => 48,
            BillingInterval::Quinquennial => 60,
        }
    }
}

/// Anchor applied to the end of a notice period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticePeriodAnchor {
    EndOfDuration,
    EndOfMonth,
    EndOfQuarter,
}

impl NoticePeriodAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticePeriodAnchor::EndOfDuration => "end_of_duration",
            NoticePeriodAnchor::EndOfMonth => "end_of_month",
            NoticePeriodAnchor::EndOfQuarter => "end_of_quarter",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "end_of_month" => NoticePeriodAnchor::EndOfMonth,
            "end_of_quarter" => NoticePeriodAnchor::EndOfQuarter,
            _ => NoticePeriodAnchor::EndOfDuration,
        }
    }
}

/// Contract.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub contract_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub billing_start_date: Option<NaiveDate>,
    pub billing_interval: String,
    pub billing_anchor_day: i32,
    pub billing_alignment_date: Option<NaiveDate>,
    pub min_duration_months: i32,
    pub notice_period_months: i32,
    pub notice_period_anchor: String,
    pub notice_period_after_min_months: Option<i32>,
    pub cancelled_at: Option<NaiveDate>,
    pub cancellation_effective_date: Option<NaiveDate>,
    pub cancellation_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Contract {
    pub fn status(&self) -> ContractStatus {
        ContractStatus::from_string(&self.status)
    }

    pub fn notice_anchor(&self) -> NoticePeriodAnchor {
        NoticePeriodAnchor::from_string(&self.notice_period_anchor)
    }

    /// Date the contract's billing cycle grid starts from. Draft contracts
    /// without an explicit billing start bill from their start date.
    pub fn billing_anchor(&self) -> NaiveDate {
        self.billing_start_date.unwrap_or(self.start_date)
    }
}
