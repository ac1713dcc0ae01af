//! PostgreSQL store integration tests: price periods, amendments and
//! invoice numbering against the real schema.

mod common;

use common::{date, PostgresApp};
use contract_service::error::DomainError;
use contract_service::models::{Actor, NewItemPrice, PatternFlags, PricePeriod, PriceSource};
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use uuid::Uuid;

fn period(
    from: chrono::NaiveDate,
    to: Option<chrono::NaiveDate>,
    unit_price: rust_decimal::Decimal,
) -> NewItemPrice {
    NewItemPrice {
        valid_from: from,
        valid_to: to,
        unit_price,
        price_period: PricePeriod::Monthly,
        source: PriceSource::Fixed,
    }
}

#[tokio::test]
async fn price_periods_are_validated_in_the_database() {
    let Some(app) = PostgresApp::spawn().await else {
        return;
    };
    let contracts = &app.state.contracts;
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    let item = app.seed_item(&contract, "Support", 1, dec!(90)).await;
    let actor = Actor::system("test");

    contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2025, 1, 1), Some(date(2025, 12, 31)), dec!(80)),
            &actor,
        )
        .await
        .unwrap();
    contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2026, 1, 1), None, dec!(100)),
            &actor,
        )
        .await
        .unwrap();

    let overlap = contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2025, 6, 1), Some(date(2025, 6, 30)), dec!(70)),
            &actor,
        )
        .await;
    assert!(matches!(overlap, Err(DomainError::OverlappingPricePeriod { .. })));

    let second_open = contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2030, 1, 1), None, dec!(150)),
            &actor,
        )
        .await;
    assert!(matches!(second_open, Err(DomainError::MultipleOpenEndedPeriods)));

    let resolved = contracts
        .resolve_price(app.tenant_id, item.item_id, date(2025, 5, 1))
        .await
        .unwrap();
    assert_eq!(resolved.unit_price, dec!(80));

    let amendments = contracts
        .amendments(app.tenant_id, contract.contract_id)
        .await
        .unwrap();
    assert_eq!(amendments.len(), 2);

    app.cleanup().await;
}

#[tokio::test]
async fn item_update_writes_an_amendment() {
    let Some(app) = PostgresApp::spawn().await else {
        return;
    };
    let contracts = &app.state.contracts;
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    let item = app.seed_item(&contract, "Seats", 5, dec!(20)).await;

    let updated = contracts
        .update_item_quantity(app.tenant_id, item.item_id, 7, &Actor::system("test"))
        .await
        .unwrap();
    assert_eq!(updated.quantity, 7);

    let amendments = contracts
        .amendments(app.tenant_id, contract.contract_id)
        .await
        .unwrap();
    assert_eq!(amendments.len(), 1);
    assert_eq!(amendments[0].changes["quantity"]["old"], 5);
    assert_eq!(amendments[0].changes["quantity"]["new"], 7);

    app.cleanup().await;
}

#[tokio::test]
async fn monthly_invoice_run_is_idempotent() {
    let Some(app) = PostgresApp::spawn().await else {
        return;
    };
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    app.seed_item(&contract, "Support", 2, dec!(50)).await;
    let actor = Actor::system("monthly-billing");

    let first = app
        .state
        .invoices
        .generate_for_month(app.tenant_id, 2025, 3, &actor)
        .await
        .unwrap();
    let second = app
        .state
        .invoices
        .generate_for_month(app.tenant_id, 2025, 3, &actor)
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].invoice_number, "RE-2025-0001");
    assert_eq!(first[0].total_amount, dec!(100.00));
    assert_eq!(second[0].invoice_id, first[0].invoice_id);

    let lines = app
        .state
        .invoices
        .invoice_lines(app.tenant_id, first[0].invoice_id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);

    let scheme = app.state.invoices.numbering_scheme(app.tenant_id).await.unwrap();
    assert_eq!(scheme.counter, 1);

    app.cleanup().await;
}

#[tokio::test]
async fn backfilled_month_keeps_numbers_unique() {
    let Some(app) = PostgresApp::spawn().await else {
        return;
    };
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    app.seed_item(&contract, "Support", 1, dec!(50)).await;
    let actor = Actor::system("monthly-billing");

    let mut numbers = Vec::new();
    for (year, month) in [(2025, 10), (2025, 12), (2026, 1), (2025, 11)] {
        let run = app
            .state
            .invoices
            .generate_for_month(app.tenant_id, year, month, &actor)
            .await
            .unwrap();
        numbers.push(run[0].invoice_number.clone());
    }

    assert_eq!(
        numbers,
        vec!["RE-2025-0001", "RE-2025-0002", "RE-2026-0001", "RE-2026-0002"]
    );
    assert_eq!(numbers.iter().collect::<BTreeSet<_>>().len(), numbers.len());

    app.cleanup().await;
}

#[tokio::test]
async fn concurrent_detection_runs_update_one_pattern() {
    let Some(app) = PostgresApp::spawn().await else {
        return;
    };
    let today = date(2025, 6, 20);
    let streaming = Uuid::new_v4();
    for month in 2..=5 {
        app.seed_transaction(streaming, "Streaming AG", date(2025, month, 15), dec!(-12.99))
            .await;
    }

    let patterns = &app.state.patterns;
    let (first, second) = tokio::join!(
        patterns.detect_recurring_patterns(app.tenant_id, today),
        patterns.detect_recurring_patterns(app.tenant_id, today),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].pattern_id, second[0].pattern_id);

    patterns
        .set_flags(
            app.tenant_id,
            first[0].pattern_id,
            PatternFlags {
                is_confirmed: true,
                is_ignored: false,
                is_paused: false,
            },
        )
        .await
        .unwrap();
    let rerun = patterns
        .detect_recurring_patterns(app.tenant_id, today)
        .await
        .unwrap();
    assert_eq!(rerun[0].pattern_id, first[0].pattern_id);
    assert!(rerun[0].is_confirmed);

    let stored = patterns.list_patterns(app.tenant_id).await.unwrap();
    assert_eq!(stored.len(), 1);

    app.cleanup().await;
}
