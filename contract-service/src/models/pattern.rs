//! Recurring payment patterns.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFrequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    Irregular,
}

impl PatternFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::SemiAnnual => "semi_annual",
            Self::Annual => "annual",
            Self::Irregular => "irregular",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "monthly" => Self::Monthly,
            "quarterly" => Self::Quarterly,
            "semi_annual" => Self::SemiAnnual,
            "annual" => Self::Annual,
            _ => Self::Irregular,
        }
    }

    /// Months between occurrences. `None` for irregular patterns.
    pub fn months(&self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::SemiAnnual => Some(6),
            Self::Annual => Some(12),
            Self::Irregular => None,
        }
    }
}

/// Direction of money flow. Part of a pattern's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSign {
    Cost,
    Income,
}

impl AmountSign {
    /// Sign of a non-zero amount. Zero has no sign.
    pub fn of(amount: Decimal) -> Option<Self> {
        if amount > Decimal::ZERO {
            Some(Self::Income)
        } else if amount < Decimal::ZERO {
            Some(Self::Cost)
        } else {
            None
        }
    }

    /// Value of SQL `sign()` for amounts of this direction.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Cost => -1,
            Self::Income => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurringPattern {
    pub pattern_id: Uuid,
    pub tenant_id: Uuid,
    /// `counterparty:{id}` or `booking:{name}`.
    pub counterparty_key: String,
    pub counterparty_id: Option<Uuid>,
    pub counterparty_name: String,
    pub average_amount: Decimal,
    pub frequency: String,
    pub day_of_month: i32,
    pub confidence_score: f64,
    pub is_confirmed: bool,
    pub is_ignored: bool,
    pub is_paused: bool,
    pub last_occurrence: NaiveDate,
    pub source_transaction_ids: Vec<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// User decisions on a detected pattern. Kept across detection runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFlags {
    pub is_confirmed: bool,
    pub is_ignored: bool,
    pub is_paused: bool,
}

impl RecurringPattern {
    pub fn flags(&self) -> PatternFlags {
        PatternFlags {
            is_confirmed: self.is_confirmed,
            is_ignored: self.is_ignored,
            is_paused: self.is_paused,
        }
    }

    pub fn frequency(&self) -> PatternFrequency {
        PatternFrequency::from_string(&self.frequency)
    }

    pub fn sign(&self) -> Option<AmountSign> {
        AmountSign::of(self.average_amount)
    }
}
