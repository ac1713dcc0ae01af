//! Integration tests for persisted price resolution and price periods.

mod common;

use common::{date, spawn_app};
use contract_service::error::DomainError;
use contract_service::models::{Actor, NewItemPrice, PricePeriod, PriceSource};
use rust_decimal_macros::dec;
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
        source: PriceSource::Negotiated,
    }
}

#[tokio::test]
async fn item_without_periods_resolves_to_base_price() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    let item = app.seed_item(&contract, "Support", 1, dec!(50)).await;

    for d in [date(2025, 1, 1), date(2030, 12, 31), date(1999, 6, 1)] {
        let resolved = app
            .contracts
            .resolve_price(app.tenant_id, item.item_id, d)
            .await
            .unwrap();
        assert_eq!(resolved.unit_price, dec!(50));
        assert_eq!(resolved.price_period, "monthly");
    }
}

#[tokio::test]
async fn periods_cover_their_years_and_gaps_fall_back() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    let item = app.seed_item(&contract, "Support", 1, dec!(90)).await;
    app.seed_price(&item, date(2025, 1, 1), Some(date(2025, 3, 31)), dec!(80))
        .await;
    app.seed_price(&item, date(2025, 7, 1), Some(date(2025, 12, 31)), dec!(85))
        .await;
    app.seed_price(&item, date(2026, 1, 1), Some(date(2026, 12, 31)), dec!(100))
        .await;
    app.seed_price(&item, date(2027, 1, 1), None, dec!(120)).await;

    let cases = [
        (date(2025, 2, 10), dec!(80)),
        (date(2025, 5, 15), dec!(90)),
        (date(2025, 12, 31), dec!(85)),
        (date(2026, 7, 20), dec!(100)),
        (date(2028, 6, 15), dec!(120)),
    ];
    for (d, expected) in cases {
        let resolved = app
            .contracts
            .resolve_price(app.tenant_id, item.item_id, d)
            .await
            .unwrap();
        assert_eq!(resolved.unit_price, expected, "price on {}", d);
    }
}

#[tokio::test]
async fn monthly_price_normalizes_longer_periods() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "annual").await;
    let mut item = app.seed_item(&contract, "Licence", 1, dec!(1200)).await;
    item.price_period = "annual".to_string();
    app.save_item(&item).await;

    let monthly = app
        .contracts
        .resolve_monthly_price(app.tenant_id, item.item_id, date(2025, 6, 1))
        .await
        .unwrap();
    assert_eq!(monthly, dec!(100));
}

#[tokio::test]
async fn add_price_period_enforces_period_invariants() {
    let app = spawn_app();
    let contract = app.seed_contract(date(2025, 1, 1), "monthly").await;
    let item = app.seed_item(&contract, "Support", 1, dec!(90)).await;
    let actor = Actor::user(Uuid::new_v4(), "Jo Example");

    let year_2025 = app
        .contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2025, 1, 1), Some(date(2025, 12, 31)), dec!(80)),
            &actor,
        )
        .await
        .unwrap();
    app.contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2026, 1, 1), None, dec!(100)),
            &actor,
        )
        .await
        .unwrap();

    let overlap = app
        .contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2025, 12, 1), Some(date(2025, 12, 15)), dec!(70)),
            &actor,
        )
        .await;
    assert!(matches!(
        overlap,
        Err(DomainError::OverlappingPricePeriod { existing }) if existing == year_2025.price_id
    ));

    let second_open = app
        .contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2030, 1, 1), None, dec!(150)),
            &actor,
        )
        .await;
    assert!(matches!(second_open, Err(DomainError::MultipleOpenEndedPeriods)));

    let reversed = app
        .contracts
        .add_price_period(
            app.tenant_id,
            item.item_id,
            period(date(2024, 6, 1), Some(date(2024, 1, 1)), dec!(60)),
            &actor,
        )
        .await;
    assert!(matches!(reversed, Err(DomainError::InvalidPricePeriod(_))));

    let resolved = app
        .contracts
        .resolve_price(app.tenant_id, item.item_id, date(2026, 3, 1))
        .await
        .unwrap();
    assert_eq!(resolved.unit_price, dec!(100));

    let amendments = app
        .contracts
        .amendments(app.tenant_id, contract.contract_id)
        .await
        .unwrap();
    assert_eq!(amendments.len(), 2);
    assert!(amendments
        .iter()
        .all(|a| a.amendment_type == "price_period_added" && a.actor_name == "Jo Example"));
    assert_eq!(amendments[0].changes["unit_price"]["new"], "80");
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let app = spawn_app();
    let missing = Uuid::new_v4();

    let result = app
        .contracts
        .resolve_price(app.tenant_id, missing, date(2025, 1, 1))
        .await;
    assert!(matches!(result, Err(DomainError::ItemNotFound(id)) if id == missing));

    let result = app
        .contracts
        .add_price_period(
            app.tenant_id,
            missing,
            period(date(2025, 1, 1), None, dec!(1)),
            &Actor::system("import"),
        )
        .await;
    assert!(matches!(result, Err(DomainError::ItemNotFound(_))));
}
