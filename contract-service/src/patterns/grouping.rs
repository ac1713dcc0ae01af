//! Grouping of bank transactions into recurring-payment candidates.

use crate::models::{AmountSign, BankTransaction};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Booking-text rule for transactions without a usable counterparty.
pub struct BookingRule {
    pub name: &'static str,
    pub pattern: Regex,
    /// Batch transfers (payroll and the like) vary in total between runs.
    pub is_batch: bool,
}

fn rule(name: &'static str, pattern: &str, is_batch: bool) -> Option<BookingRule> {
    Regex::new(pattern).ok().map(|pattern| BookingRule {
        name,
        pattern,
        is_batch,
    })
}

static BOOKING_RULES: Lazy<Vec<BookingRule>> = Lazy::new(|| {
    [
        rule(
            "SEPA Sammelüberweisung",
            r"(?i)sammel[uü]e?berweisung|sepa[\s-]*sammel|sammler",
            true,
        ),
        rule("Lohn/Gehalt", r"(?i)\b(lohn|gehalt|payroll)\b", true),
        rule(
            "Sozialversicherung",
            r"(?i)sozialversicherung|krankenkasse|beitragsnachweis",
            true,
        ),
        rule("Finanzamt", r"(?i)finanzamt|steuer(n)?\s*nr", false),
        rule(
            "Kontoführung",
            r"(?i)kontof[uü]e?hrung|rechnungsabschluss|entgeltabschluss",
            false,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// First booking rule matching `text`.
pub fn extract_booking_pattern(text: &str) -> Option<&'static BookingRule> {
    BOOKING_RULES.iter().find(|r| r.pattern.is_match(text))
}

/// Transactions sharing a counterparty (or booking pattern) and a sign.
#[derive(Debug, Clone)]
pub struct TransactionGroup {
    /// `counterparty:{id}` or `booking:{name}`.
    pub key: String,
    pub counterparty_id: Option<Uuid>,
    pub display_name: String,
    /// False for groups formed from booking text alone.
    pub has_counterparty: bool,
    pub is_batch: bool,
    pub sign: AmountSign,
    /// Ordered by booking date.
    pub transactions: Vec<BankTransaction>,
}

struct GroupIdentity {
    key: String,
    counterparty_id: Option<Uuid>,
    display_name: String,
    has_counterparty: bool,
    is_batch: bool,
}

fn identify(tx: &BankTransaction) -> Option<GroupIdentity> {
    if let Some(name) = tx.known_counterparty() {
        let key = match tx.counterparty_id {
            Some(id) => format!("counterparty:{}", id),
            None => format!("counterparty:{}", name.to_lowercase()),
        };
        return Some(GroupIdentity {
            key,
            counterparty_id: tx.counterparty_id,
            display_name: name.to_string(),
            has_counterparty: true,
            is_batch: false,
        });
    }

    extract_booking_pattern(&tx.booking_text).map(|rule| GroupIdentity {
        key: format!("booking:{}", rule.name),
        counterparty_id: None,
        display_name: rule.name.to_string(),
        has_counterparty: false,
        is_batch: rule.is_batch,
    })
}

/// Group transactions by counterparty and sign. Zero amounts and
/// transactions that match neither a counterparty nor a booking rule are
/// dropped. Groups come back in key order.
pub fn group_transactions(transactions: &[BankTransaction]) -> Vec<TransactionGroup> {
    let mut groups: BTreeMap<(String, AmountSign), TransactionGroup> = BTreeMap::new();

    for tx in transactions {
        let Some(sign) = AmountSign::of(tx.amount) else {
            continue;
        };
        let Some(identity) = identify(tx) else {
            continue;
        };

        groups
            .entry((identity.key.clone(), sign))
            .or_insert_with(|| TransactionGroup {
                key: identity.key,
                counterparty_id: identity.counterparty_id,
                display_name: identity.display_name,
                has_counterparty: identity.has_counterparty,
                is_batch: identity.is_batch,
                sign,
                transactions: Vec::new(),
            })
            .transactions
            .push(tx.clone());
    }

    groups
        .into_values()
        .map(|mut group| {
            group
                .transactions
                .sort_by(|a, b| a.booking_date.cmp(&b.booking_date));
            group
        })
        .collect()
}
