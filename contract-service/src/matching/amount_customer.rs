use crate::matching::{MatchStrategy, StrategyMatch};
use crate::models::{BankTransaction, ImportedInvoice, MatchType};

const CONFIDENCE: f64 = 0.8;

/// Incoming payment of exactly the invoice total from a counterparty linked
/// to the invoice's customer.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmountCustomerStrategy;

impl MatchStrategy for AmountCustomerStrategy {
    fn name(&self) -> &'static str {
        "amount_customer"
    }

    fn evaluate(&self, invoice: &ImportedInvoice, tx: &BankTransaction) -> Option<StrategyMatch> {
        if !tx.is_credit() || tx.amount != invoice.total_amount {
            return None;
        }
        let customer = invoice.customer_id?;
        (tx.counterparty_customer_id == Some(customer)).then_some(StrategyMatch {
            match_type: MatchType::AmountCustomer,
            confidence: CONFIDENCE,
        })
    }
}
