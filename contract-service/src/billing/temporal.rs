//! Contract term helpers: minimum duration, notice periods, alignment.

use crate::billing::period::{
    add_months, interval_months, last_day_of_month, last_day_of_quarter, CycleDates,
};
use crate::models::{Contract, ContractStatus, NoticePeriodAnchor};
use chrono::NaiveDate;

impl Contract {
    pub fn interval_months(&self) -> u32 {
        interval_months(&self.billing_interval)
    }

    /// End of the minimum term, if the contract has one.
    pub fn min_end_date(&self) -> Option<NaiveDate> {
        (self.min_duration_months > 0)
            .then(|| add_months(self.start_date, self.min_duration_months.unsigned_abs()))
    }

    /// First date the contract can end if notice is given on `from`.
    pub fn earliest_cancellation_date(&self, from: NaiveDate) -> NaiveDate {
        let min_end = self.min_end_date();
        let past_min_term = min_end.is_none_or(|end| from >= end);

        let notice_months = match self.notice_period_after_min_months {
            Some(after_min) if past_min_term => after_min,
            _ => self.notice_period_months,
        };
        let notice_end = add_months(from, notice_months.max(0).unsigned_abs());

        match self.notice_anchor() {
            NoticePeriodAnchor::EndOfMonth => last_day_of_month(notice_end),
            NoticePeriodAnchor::EndOfQuarter => last_day_of_quarter(notice_end),
            NoticePeriodAnchor::EndOfDuration => match min_end {
                Some(end) => notice_end.max(end),
                None => notice_end,
            },
        }
    }

    /// Date the contract ends as things stand on `today`.
    pub fn effective_end_date(&self, today: NaiveDate) -> NaiveDate {
        if let Some(end) = self.end_date.or(self.cancellation_effective_date) {
            return end;
        }
        match self.min_end_date() {
            Some(min_end) if today < min_end => min_end,
            _ => self.earliest_cancellation_date(today),
        }
    }

    /// Next contract cycle boundary strictly after `from`. A date that falls
    /// exactly on a boundary yields the following one.
    pub fn suggested_alignment_date(&self, from: NaiveDate) -> NaiveDate {
        CycleDates::new(self.billing_anchor(), self.interval_months())
            .find(|cycle_start| *cycle_start > from)
            .unwrap_or(NaiveDate::MAX)
    }

    /// Status as it should be presented. An active contract whose end date
    /// has passed reads as ended; the stored status is left alone.
    pub fn effective_status(&self, today: NaiveDate) -> ContractStatus {
        let status = self.status();
        if status == ContractStatus::Active && self.end_date.is_some_and(|end| end < today) {
            ContractStatus::Ended
        } else {
            status
        }
    }
}
