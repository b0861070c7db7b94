mod common;

use caisse::domain::catalog::Settings;
use caisse::domain::loyalty::LoyaltyKind;
use caisse::domain::money::{Amount, Money};
use caisse::domain::order::{OrderStatus, OrderType};
use caisse::domain::payment::{PaymentMethod, PaymentStatus};
use caisse::domain::promotion::{PromotionDefinition, PromotionKind};
use caisse::error::EngineError;
use chrono::{Duration, NaiveDate};
use common::{complete, engine, engine_with, money, new_order, pay};
use rust_decimal_macros::dec;

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

#[tokio::test]
async fn test_percentage_and_free_delivery_on_delivery_order() {
    let promotions = vec![
        PromotionDefinition::new(1, "Hiver", PromotionKind::Percentage { percent: dec!(10) }),
        PromotionDefinition::new(2, "Livraison offerte", PromotionKind::FreeDelivery),
    ];
    let (engine, _) = engine_with(promotions, Settings::default());

    let mut request = new_order(OrderType::Delivery, &[5, 4], None);
    request.delivery_fee = money(dec!(2.50));
    let order = engine.create_order(request).await.unwrap();

    assert_eq!(order.subtotal, money(dec!(23.50)));
    assert_eq!(order.total, money(dec!(21.15)));
    let texts: Vec<&str> = order.discounts.iter().map(|d| d.ticket_text.as_str()).collect();
    assert_eq!(texts, vec!["Hiver -10%", "Livraison offerte (free delivery)"]);
    assert_eq!(order.discounts[0].amount, money(dec!(2.35)));
    assert_eq!(order.discounts[1].amount, money(dec!(2.50)));
}

#[tokio::test]
async fn test_split_payment_then_one_cent_over() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Onsite, &[1, 2, 3], None))
        .await
        .unwrap();
    assert_eq!(order.total, money(dec!(18.00)));

    let receipt = engine
        .record_payment(
            order.id,
            vec![pay(PaymentMethod::Cash, dec!(10.00)), pay(PaymentMethod::Card, dec!(8.00))],
            None,
        )
        .await
        .unwrap();
    assert_eq!(receipt.payment_status, PaymentStatus::Paid);
    assert_eq!(receipt.remaining, Money::ZERO);

    let result = engine
        .record_payment(order.id, vec![pay(PaymentMethod::Cash, dec!(0.01))], None)
        .await;
    assert!(matches!(result, Err(EngineError::OverpaymentRejected { .. })));
}

#[tokio::test]
async fn test_refund_item_goes_to_loyalty_only() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Takeaway, &[1, 4], Some(12)))
        .await
        .unwrap();
    engine
        .record_payment(order.id, vec![pay(PaymentMethod::Card, dec!(18.50))], None)
        .await
        .unwrap();
    complete(&engine, order.id).await;

    let before = engine.loyalty_balance(12).await.unwrap().balance;
    let payments = engine.get_order(order.id).await.unwrap().payments;

    let receipt = engine
        .refund_items(order.id, vec![1], "salade oubliée")
        .await
        .unwrap();
    assert_eq!(receipt.amount, money(dec!(6.50)));

    let after = engine.loyalty_balance(12).await.unwrap().balance;
    assert_eq!(after - before, money(dec!(6.50)));
    assert_eq!(engine.get_order(order.id).await.unwrap().payments, payments);
}

#[tokio::test]
async fn test_close_day_with_order_in_preparation() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Onsite, &[2], None))
        .await
        .unwrap();
    engine
        .transition(order.id, OrderStatus::InPreparation, "kitchen", None, &[])
        .await
        .unwrap();

    let result = engine.close_day(jan(10), "manager").await;
    assert!(matches!(result, Err(EngineError::PendingOrders { count: 1, .. })));
    assert!(engine.ticket(jan(10)).await.is_err());
    assert_eq!(engine.daily_status(jan(10)).await.unwrap().pending_orders, 1);
}

#[tokio::test]
async fn test_repeated_transition_has_no_duplicate_side_effects() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Takeaway, &[5], Some(4)))
        .await
        .unwrap();
    let first = engine
        .transition(order.id, OrderStatus::InPreparation, "admin", None, &[])
        .await
        .unwrap();
    let second = engine
        .transition(order.id, OrderStatus::InPreparation, "kiosk", None, &[])
        .await
        .unwrap();
    assert_eq!(first, second);

    engine
        .record_payment(order.id, vec![pay(PaymentMethod::Card, dec!(17.00))], None)
        .await
        .unwrap();
    engine
        .transition(order.id, OrderStatus::Ready, "kitchen", None, &[])
        .await
        .unwrap();
    for _ in 0..3 {
        engine
            .transition(order.id, OrderStatus::Completed, "counter", None, &[])
            .await
            .unwrap();
    }

    let entries = engine.loyalty_entries(4).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LoyaltyKind::Earn);
    assert_eq!(entries[0].amount, money(dec!(0.85)));
}

#[tokio::test]
async fn test_close_day_is_exactly_once() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Onsite, &[1, 2, 3], None))
        .await
        .unwrap();
    engine
        .record_payment(
            order.id,
            vec![pay(PaymentMethod::Cash, dec!(10.00)), pay(PaymentMethod::Card, dec!(8.00))],
            None,
        )
        .await
        .unwrap();
    complete(&engine, order.id).await;

    let ticket = engine.close_day(jan(10), "manager").await.unwrap();
    assert_eq!(ticket.completed_orders, 1);
    assert_eq!(ticket.total_collected, money(dec!(18.00)));
    assert_eq!(ticket.payments_by_method.len(), 2);

    let again = engine.close_day(jan(10), "someone else").await;
    assert!(matches!(again, Err(EngineError::AlreadyClosed(_))));
    assert_eq!(engine.ticket(jan(10)).await.unwrap(), ticket);
}

#[tokio::test]
async fn test_late_payment_on_closed_day_rejected() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Onsite, &[2], None))
        .await
        .unwrap();
    complete(&engine, order.id).await;
    let ticket = engine.close_day(jan(10), "manager").await.unwrap();
    assert_eq!(ticket.total_unpaid, money(dec!(3.50)));

    let result = engine
        .record_payment(order.id, vec![pay(PaymentMethod::Cash, dec!(3.50))], None)
        .await;
    assert!(matches!(result, Err(EngineError::DayClosed(d)) if d == jan(10)));
}

#[tokio::test]
async fn test_needs_closure_after_skipped_day() {
    let (engine, clock) = engine();
    let order = engine
        .create_order(new_order(OrderType::Onsite, &[3], None))
        .await
        .unwrap();
    engine
        .transition(order.id, OrderStatus::Canceled, "admin", Some("erreur de saisie"), &[])
        .await
        .unwrap();

    clock.advance(Duration::days(1));
    engine
        .create_order(new_order(OrderType::Onsite, &[3], None))
        .await
        .unwrap();

    let status = engine.daily_status(jan(11)).await.unwrap();
    assert!(status.needs_closure);
    assert_eq!(status.oldest_unclosed_date, Some(jan(10)));
    assert_eq!(status.pending_orders, 1);

    engine.close_day(jan(10), "manager").await.unwrap();
    let status = engine.daily_status(jan(11)).await.unwrap();
    assert!(!status.needs_closure);
    assert!(engine.daily_status(jan(10)).await.unwrap().is_closed);
}

#[tokio::test]
async fn test_delivery_goes_through_out_for_delivery() {
    let (engine, _) = engine();
    let mut request = new_order(OrderType::Delivery, &[5], None);
    request.delivery_fee = money(dec!(2.50));
    let order = engine.create_order(request).await.unwrap();
    assert_eq!(order.total, money(dec!(19.50)));

    for target in [OrderStatus::InPreparation, OrderStatus::Ready] {
        engine.transition(order.id, target, "kitchen", None, &[]).await.unwrap();
    }
    let skipped = engine
        .transition(order.id, OrderStatus::Completed, "kitchen", None, &[])
        .await;
    assert!(matches!(skipped, Err(EngineError::IllegalTransition { .. })));
    engine
        .transition(order.id, OrderStatus::OutForDelivery, "rider", None, &[])
        .await
        .unwrap();
    engine
        .transition(order.id, OrderStatus::Completed, "rider", None, &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fidelity_multiplier_doubles_earn() {
    let promotions = vec![PromotionDefinition::new(
        9,
        "Double cashback",
        PromotionKind::FidelityMultiplier { multiplier: 2 },
    )];
    let (engine, _) = engine_with(
        promotions,
        Settings {
            loyalty_percentage: dec!(5),
            vat_rate: dec!(10),
        },
    );
    let order = engine
        .create_order(new_order(OrderType::Takeaway, &[1, 2, 3], Some(8)))
        .await
        .unwrap();
    assert_eq!(order.loyalty_multiplier, 2);
    assert_eq!(order.total, money(dec!(18.00)));

    complete(&engine, order.id).await;
    assert_eq!(engine.loyalty_balance(8).await.unwrap().balance, Money::ZERO);

    // Paying after completion triggers the earn.
    engine
        .record_payment(order.id, vec![pay(PaymentMethod::Card, dec!(18.00))], None)
        .await
        .unwrap();
    assert_eq!(engine.loyalty_balance(8).await.unwrap().balance, money(dec!(1.80)));
}

#[tokio::test]
async fn test_cash_change_is_not_counted_as_paid() {
    let (engine, _) = engine();
    let order = engine
        .create_order(new_order(OrderType::Onsite, &[5], None))
        .await
        .unwrap();
    let receipt = engine
        .record_payment(
            order.id,
            vec![pay(PaymentMethod::Cash, dec!(17.00)).with_tendered(Amount::new(dec!(20.00)).unwrap())],
            None,
        )
        .await
        .unwrap();
    assert_eq!(receipt.paid, money(dec!(17.00)));
    assert_eq!(receipt.change_due, money(dec!(3.00)));
    assert_eq!(receipt.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_cancel_returns_redeemed_cashback() {
    let (engine, _) = engine();
    let first = engine
        .create_order(new_order(OrderType::Takeaway, &[4], Some(2)))
        .await
        .unwrap();
    engine
        .record_payment(first.id, vec![pay(PaymentMethod::Card, dec!(6.50))], None)
        .await
        .unwrap();
    complete(&engine, first.id).await;
    engine.refund_items(first.id, vec![0], "oubli").await.unwrap();
    let balance = engine.loyalty_balance(2).await.unwrap().balance;
    assert_eq!(balance, money(dec!(6.83)));

    let second = engine
        .create_order(new_order(OrderType::Takeaway, &[1], Some(2)))
        .await
        .unwrap();
    engine
        .redeem_cashback(second.id, Amount::new(dec!(5.00)).unwrap(), None)
        .await
        .unwrap();
    engine
        .record_payment(second.id, vec![pay(PaymentMethod::Cash, dec!(7.00))], None)
        .await
        .unwrap();
    assert_eq!(engine.loyalty_balance(2).await.unwrap().balance, money(dec!(1.83)));

    let canceled = engine
        .transition(second.id, OrderStatus::Canceled, "admin", Some("client absent"), &[])
        .await
        .unwrap();
    assert_eq!(canceled.paid(), Money::ZERO);
    assert_eq!(engine.loyalty_balance(2).await.unwrap().balance, balance);
}
