//! Price resolution over dated price periods.

use crate::billing::period::price_period_months;
use crate::error::DomainError;
use crate::models::{ContractItem, ContractItemPrice, NewItemPrice};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Price in effect for an item on a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub price_period: String,
}

impl ResolvedPrice {
    pub fn period_months(&self) -> u32 {
        price_period_months(&self.price_period)
    }

    /// Price per month, for comparing prices of different cadences.
    pub fn monthly(&self) -> Decimal {
        self.unit_price / Decimal::from(self.period_months())
    }

    /// Amount for `quantity` units over `months` months. Multiplies before
    /// dividing by the period length so whole-period amounts stay exact.
    pub fn amount_for_months(&self, quantity: i32, months: Decimal) -> Decimal {
        Decimal::from(quantity) * self.unit_price * months / Decimal::from(self.period_months())
    }
}

/// Resolve the price of `item` on `target`.
///
/// `periods` may hold periods of other items (batch callers pass everything
/// for a contract); only those belonging to `item` are considered. Among the
/// periods covering `target` the one with the latest `valid_from` wins. If
/// none covers the date the item's own price applies, even when a period
/// exists on either side of it.
pub fn resolve_price(
    item: &ContractItem,
    target: NaiveDate,
    periods: &[ContractItemPrice],
) -> ResolvedPrice {
    periods
        .iter()
        .filter(|p| p.item_id == item.item_id && p.covers(target))
        .max_by_key(|p| p.valid_from)
        .map(|p| ResolvedPrice {
            unit_price: p.unit_price,
            price_period: p.price_period.clone(),
        })
        .unwrap_or_else(|| ResolvedPrice {
            unit_price: item.unit_price,
            price_period: item.price_period.clone(),
        })
}

/// Monthly-normalized variant of [`resolve_price`].
pub fn resolve_monthly_price(
    item: &ContractItem,
    target: NaiveDate,
    periods: &[ContractItemPrice],
) -> Decimal {
    resolve_price(item, target, periods).monthly()
}

/// Check a new period against an item's existing ones: the range must be
/// well-formed, must not overlap any existing period and at most one period
/// may be open-ended.
pub fn validate_price_period(
    existing: &[ContractItemPrice],
    new: &NewItemPrice,
) -> Result<(), DomainError> {
    if let Some(to) = new.valid_to {
        if to < new.valid_from {
            return Err(DomainError::InvalidPricePeriod(format!(
                "valid_to {} is before valid_from {}",
                to, new.valid_from
            )));
        }
    }
    if new.unit_price.is_sign_negative() {
        return Err(DomainError::InvalidPricePeriod(
            "unit_price must not be negative".to_string(),
        ));
    }
    if new.valid_to.is_none() && existing.iter().any(|p| p.valid_to.is_none()) {
        return Err(DomainError::MultipleOpenEndedPeriods);
    }
    if let Some(clash) = existing
        .iter()
        .find(|p| p.overlaps(new.valid_from, new.valid_to))
    {
        return Err(DomainError::OverlappingPricePeriod {
            existing: clash.price_id,
        });
    }
    Ok(())
}
