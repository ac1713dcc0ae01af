//! Integration tests for billing and recognition schedules.

mod common;

use common::{date, spawn_app};
use contract_service::billing::ScheduleWindow;
use contract_service::error::DomainError;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn year_specific_prices_drive_annual_events() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "annual").await;
    let item = app.seed_item(&contract, "Server", 2, dec!(100)).await;
    app.seed_price(&item, date(2025, 1, 1), Some(date(2025, 12, 31)), dec!(80))
        .await;
    app.seed_price(&item, date(2026, 1, 1), None, dec!(100)).await;

    let events = app
        .contracts
        .billing_schedule(
            app.tenant_id,
            contract.contract_id,
            ScheduleWindow::with_history(date(2025, 1, 1), date(2026, 12, 31)),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].date, date(2025, 1, 1));
    assert_eq!(events[0].total, dec!(1920.00));
    assert_eq!(events[1].date, date(2026, 1, 1));
    assert_eq!(events[1].total, dec!(2400.00));

    let line = &events[0].items[0];
    assert_eq!(line.product_name, "Server");
    assert_eq!(line.quantity, 2);
    assert_eq!(line.unit_price, dec!(80));
    assert!(!line.is_prorated);
    assert_eq!(line.prorate_factor, None);
}

#[tokio::test]
async fn monthly_contract_bills_every_month() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    app.seed_item(&contract, "Support", 3, dec!(10)).await;

    let events = app
        .contracts
        .billing_schedule(
            app.tenant_id,
            contract.contract_id,
            ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31)),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 12);
    assert!(events.iter().all(|e| e.total == dec!(30)));
    assert!(events.windows(2).all(|w| w[0].date < w[1].date));
}

#[tokio::test]
async fn item_added_mid_cycle_is_prorated_to_suggested_alignment() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "annual").await;
    let mut item = app.seed_item(&contract, "Backup", 1, dec!(100)).await;

    let align = app
        .contracts
        .suggested_alignment_date(app.tenant_id, contract.contract_id, date(2026, 5, 4))
        .await
        .unwrap();
    assert_eq!(align, date(2027, 1, 1));

    item.billing_start_date = Some(date(2026, 5, 4));
    item.align_to_contract_at = Some(align);
    app.save_item(&item).await;

    let events = app
        .contracts
        .billing_schedule(
            app.tenant_id,
            contract.contract_id,
            ScheduleWindow::with_history(date(2026, 1, 1), date(2027, 12, 31)),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 2);

    assert_eq!(events[0].date, date(2026, 5, 4));
    let prorated = &events[0].items[0];
    assert!(prorated.is_prorated);
    assert_eq!(prorated.prorate_factor, Some(dec!(0.6667)));
    assert_eq!(prorated.amount, dec!(800.00));

    assert_eq!(events[1].date, date(2027, 1, 1));
    assert_eq!(events[1].total, dec!(1200));
    assert!(!events[1].items[0].is_prorated);
}

#[tokio::test]
async fn alignment_on_own_start_emits_no_prorated_event() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "annual").await;
    let mut item = app.seed_item(&contract, "Backup", 1, dec!(100)).await;
    item.billing_start_date = Some(date(2026, 1, 1));
    item.align_to_contract_at = Some(date(2026, 1, 1));
    app.save_item(&item).await;

    let events = app
        .contracts
        .billing_schedule(
            app.tenant_id,
            contract.contract_id,
            ScheduleWindow::with_history(date(2025, 1, 1), date(2026, 12, 31)),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, date(2026, 1, 1));
    assert!(events[0].items.iter().all(|l| !l.is_prorated));
}

#[tokio::test]
async fn recognition_starts_at_item_start_date() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    let mut item = app.seed_item(&contract, "Licence", 1, dec!(50)).await;
    item.start_date = Some(date(2025, 3, 1));
    item.billing_start_date = Some(date(2025, 4, 1));
    app.save_item(&item).await;

    let window = ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 6, 30));
    let billing = app
        .contracts
        .billing_schedule(app.tenant_id, contract.contract_id, window)
        .await
        .unwrap();
    let recognition = app
        .contracts
        .recognition_schedule(app.tenant_id, contract.contract_id, window)
        .await
        .unwrap();

    assert_eq!(billing.first().map(|e| e.date), Some(date(2025, 4, 1)));
    assert_eq!(billing.len(), 3);
    assert_eq!(recognition.first().map(|e| e.date), Some(date(2025, 3, 1)));
    assert_eq!(recognition.len(), 4);
}

#[tokio::test]
async fn upcoming_window_leaves_out_past_events() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    app.seed_item(&contract, "Support", 1, dec!(10)).await;

    let events = app
        .contracts
        .billing_schedule(
            app.tenant_id,
            contract.contract_id,
            ScheduleWindow::upcoming(date(2025, 1, 1), date(2025, 12, 31), date(2025, 6, 15)),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 6);
    assert_eq!(events[0].date, date(2025, 7, 1));
}

#[tokio::test]
async fn contract_of_other_tenant_is_not_found() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;

    let result = app
        .contracts
        .billing_schedule(
            Uuid::new_v4(),
            contract.contract_id,
            ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31)),
        )
        .await;

    assert!(matches!(result, Err(DomainError::ContractNotFound(id)) if id == contract.contract_id));
}

#[tokio::test]
async fn revenue_forecast_and_mrr_cover_active_contracts() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    app.seed_item(&contract, "Support", 2, dec!(50)).await;

    let mut paused = common::contract(app.tenant_id, date(2025, 1, 1), "monthly");
    paused.status = "paused".to_string();
    app.store.insert_contract(paused.clone()).await;
    app.seed_item(&paused, "Ignored", 1, dec!(999)).await;

    let mrr = app
        .contracts
        .monthly_recurring_revenue(app.tenant_id, date(2025, 3, 15))
        .await
        .unwrap();
    assert_eq!(mrr, dec!(100));

    let forecast = app
        .contracts
        .revenue_forecast(app.tenant_id, date(2025, 4, 1), date(2025, 6, 30), date(2025, 3, 15))
        .await
        .unwrap();
    assert_eq!(forecast.len(), 3);
    assert_eq!(forecast.get(&date(2025, 5, 1)), Some(&dec!(100)));
}
