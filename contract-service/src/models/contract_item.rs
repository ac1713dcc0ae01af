//! Contract items, their price periods and the product lookup row.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Item-level price cadence. Independent of the contract's billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePeriod {
    Monthly,
    BiMonthly,
    Quarterly,
    SemiAnnual,
    Annual,
    Biennial,
    Triennial,
    Quadrennial,
    Quinquennial,
}

impl PricePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::BiMonthly => "bi_monthly",
            Self::Quarterly => "quarterly",
            Self::SemiAnnual => "semi_annual",
            Self::Annual => "annual",
            Self::Biennial => "biennial",
            Self::Triennial => "triennial",
            Self::Quadrennial => "quadrennial",
            Self::Quinquennial => "quinquennial",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            "bi_monthly" => Some(Self::BiMonthly),
            "quarterly" => Some(Self::Quarterly),
            "semi_annual" => Some(Self::SemiAnnual),
            "annual" => Some(Self::Annual),
            "biennial" => Some(Self::Biennial),
            "triennial" => Some(Self::Triennial),
            "quadrennial" => Some(Self::Quadrennial),
            "quinquennial" => Some(Self::Quinquennial),
            _ => None,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::BiMonthly => 2,
            Self::Quarterly => 3,
            Self::SemiAnnual => 6,
            Self::Annual => 12,
            Self::Biennial => 24,
            Self::Triennial => 36,
            Self::Quadrennial => 48,
            Self::Quinquennial => 60,
        }
    }
}

/// Where a price period's amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Fixed,
    List,
    Negotiated,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::List => "list",
            Self::Negotiated => "negotiated",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "list" => Self::List,
            "negotiated" => Self::Negotiated,
            _ => Self::Fixed,
        }
    }
}

/// Product reference. Only the name is consumed here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
}

/// A line of a contract. Items without a product are descriptive only and
/// never billed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractItem {
    pub item_id: Uuid,
    pub contract_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price_period: String,
    pub start_date: Option<NaiveDate>,
    pub billing_start_date: Option<NaiveDate>,
    pub billing_end_date: Option<NaiveDate>,
    pub align_to_contract_at: Option<NaiveDate>,
    pub is_one_off: bool,
    pub price_locked: bool,
    pub price_locked_until: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Fields recorded in item amendments.
pub const ITEM_TRACKED_FIELDS: &[&str] = &[
    "quantity",
    "unit_price",
    "price_period",
    "start_date",
    "billing_start_date",
    "billing_end_date",
    "align_to_contract_at",
    "is_one_off",
    "price_locked",
    "price_locked_until",
];

impl ContractItem {
    pub fn is_billable(&self) -> bool {
        self.product_id.is_some()
    }

    /// Whether the price lock holds on `today`. Locks lapse once
    /// `price_locked_until` has passed, so this is evaluated on every call.
    pub fn is_price_locked(&self, today: NaiveDate) -> bool {
        self.price_locked
            && match self.price_locked_until {
                None => true,
                Some(until) => today <= until,
            }
    }

    /// Plain key/value snapshot of the tracked fields.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert("quantity".to_string(), json!(self.quantity));
        map.insert("unit_price".to_string(), json!(self.unit_price.to_string()));
        map.insert("price_period".to_string(), json!(self.price_period));
        map.insert("start_date".to_string(), json!(self.start_date));
        map.insert(
            "billing_start_date".to_string(),
            json!(self.billing_start_date),
        );
        map.insert("billing_end_date".to_string(), json!(self.billing_end_date));
        map.insert(
            "align_to_contract_at".to_string(),
            json!(self.align_to_contract_at),
        );
        map.insert("is_one_off".to_string(), json!(self.is_one_off));
        map.insert("price_locked".to_string(), json!(self.price_locked));
        map.insert(
            "price_locked_until".to_string(),
            json!(self.price_locked_until),
        );
        debug_assert_eq!(map.len(), ITEM_TRACKED_FIELDS.len());
        map
    }
}

/// A dated price for one item. `valid_from` and `valid_to` are inclusive;
/// a missing `valid_to` leaves the period open-ended.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractItemPrice {
    pub price_id: Uuid,
    pub item_id: Uuid,
    pub tenant_id: Uuid,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub unit_price: Decimal,
    pub price_period: String,
    pub source: String,
    pub created_utc: DateTime<Utc>,
}

impl ContractItemPrice {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.is_none_or(|to| to >= date)
    }

    /// Whether two inclusive ranges share at least one day.
    pub fn overlaps(&self, from: NaiveDate, to: Option<NaiveDate>) -> bool {
        let starts_before_other_ends = to.is_none_or(|t| self.valid_from <= t);
        let ends_after_other_starts = self.valid_to.is_none_or(|t| t >= from);
        starts_before_other_ends && ends_after_other_starts
    }
}

/// Input for a new price period.
#[derive(Debug, Clone)]
pub struct NewItemPrice {
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub unit_price: Decimal,
    pub price_period: PricePeriod,
    pub source: PriceSource,
}

impl NewItemPrice {
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("valid_from".to_string(), json!(self.valid_from)),
            ("valid_to".to_string(), json!(self.valid_to)),
            ("unit_price".to_string(), json!(self.unit_price.to_string())),
            ("price_period".to_string(), json!(self.price_period.as_str())),
            ("source".to_string(), json!(self.source.as_str())),
        ])
    }
}
