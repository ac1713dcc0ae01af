use crate::matching::{MatchStrategy, StrategyMatch};
use crate::models::{BankTransaction, ImportedInvoice, MatchType};

const EXACT_CONFIDENCE: f64 = 1.0;
const NORMALIZED_CONFIDENCE: f64 = 0.9;
const SUFFIX_CONFIDENCE: f64 = 0.7;

/// Characters compared in a suffix match.
const SUFFIX_LEN: usize = 6;

/// Suffix matching only applies to numbers longer than this.
const MIN_SUFFIX_SOURCE_LEN: usize = 4;

/// Strip `-`, `_` and spaces and fold case.
pub fn normalize_reference(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Finds the invoice number in the booking text of incoming payments.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvoiceNumberStrategy;

impl MatchStrategy for InvoiceNumberStrategy {
    fn name(&self) -> &'static str {
        "invoice_number"
    }

    fn evaluate(&self, invoice: &ImportedInvoice, tx: &BankTransaction) -> Option<StrategyMatch> {
        if !tx.is_credit() {
            return None;
        }
        let number = invoice.invoice_number.trim();
        if number.is_empty() {
            return None;
        }

        if tx.booking_text.contains(number) {
            return Some(StrategyMatch {
                match_type: MatchType::InvoiceNumberExact,
                confidence: EXACT_CONFIDENCE,
            });
        }

        let number = normalize_reference(number);
        let text = normalize_reference(&tx.booking_text);
        if number.is_empty() {
            return None;
        }
        if text.contains(&number) {
            return Some(StrategyMatch {
                match_type: MatchType::InvoiceNumberNormalized,
                confidence: NORMALIZED_CONFIDENCE,
            });
        }

        let chars: Vec<char> = number.chars().collect();
        if chars.len() > MIN_SUFFIX_SOURCE_LEN {
            let suffix: String = chars[chars.len().saturating_sub(SUFFIX_LEN)..].iter().collect();
            if text.contains(&suffix) {
                return Some(StrategyMatch {
                    match_type: MatchType::InvoiceNumberSuffix,
                    confidence: SUFFIX_CONFIDENCE,
                });
            }
        }
        None
    }
}
