//! Fixtures shared by the application unit tests.

use super::engine::{Collaborators, NewItem, NewOrder, OrderEngine, Stores};
use crate::config::EngineConfig;
use crate::domain::catalog::{Product, ProductOption, Settings};
use crate::domain::money::{Amount, Money};
use crate::domain::order::{CustomerId, Order, OrderId, OrderStatus, OrderType};
use crate::domain::payment::{PaymentMethod, PaymentRequest};
use crate::domain::promotion::{PromotionContext, PromotionDefinition};
use crate::infrastructure::in_memory::{InMemoryClosureStore, InMemoryLoyaltyStore, InMemoryOrderStore};
use crate::infrastructure::sources::{ManualClock, StaticCatalog, StaticPromotions, StaticSettings};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn product(id: u32, name: &str, category_id: u32, price: Decimal) -> Product {
    Product {
        id,
        name: name.into(),
        category_id,
        price: Money::new(price),
        options: vec![],
    }
}

pub fn catalog() -> StaticCatalog {
    let mut burger = product(1, "Burger", 1, dec!(12.00));
    burger.options.push(ProductOption {
        id: 10,
        name: "Bacon".into(),
        price_delta: Money::new(dec!(1.50)),
    });
    StaticCatalog::new(vec![
        burger,
        product(2, "Frites", 2, dec!(3.50)),
        product(3, "Boisson", 3, dec!(2.50)),
        product(4, "Salade", 1, dec!(6.50)),
    ])
}

/// Engine on in-memory stores, 5% cashback, 10% VAT, clock at
/// 2024-01-10 11:00 UTC.
pub fn engine_with(promotions: Vec<PromotionDefinition>) -> OrderEngine {
    OrderEngine::new(
        Stores {
            orders: Box::new(InMemoryOrderStore::new()),
            loyalty: Box::new(InMemoryLoyaltyStore::new()),
            closures: Box::new(InMemoryClosureStore::new()),
        },
        Collaborators {
            catalog: Box::new(catalog()),
            promotions: Box::new(StaticPromotions::new(promotions)),
            settings: Box::new(StaticSettings::new(Settings {
                loyalty_percentage: dec!(5),
                vat_rate: dec!(10),
            })),
            clock: Box::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap(),
            )),
        },
        EngineConfig::default(),
    )
}

/// Burger, frites and a drink: 18.00.
pub fn takeaway() -> NewOrder {
    NewOrder {
        order_type: OrderType::Takeaway,
        items: [1, 2, 3]
            .into_iter()
            .map(|product_id| NewItem {
                product_id,
                quantity: 1,
                option_ids: vec![],
            })
            .collect(),
        delivery_fee: Money::ZERO,
        customer_id: None,
        context: PromotionContext::default(),
    }
}

pub fn with_customer(mut order: NewOrder, customer_id: CustomerId) -> NewOrder {
    order.customer_id = Some(customer_id);
    order
}

pub async fn order_with(engine: &OrderEngine, request: NewOrder) -> Order {
    engine.create_order(request).await.unwrap()
}

pub fn pay(method: PaymentMethod, value: Decimal) -> PaymentRequest {
    PaymentRequest::new(method, Amount::new(value).unwrap())
}

/// Walks an order through the kitchen to `Completed`.
pub async fn complete(engine: &OrderEngine, order_id: OrderId) {
    let order = engine.get_order(order_id).await.unwrap();
    let mut path = vec![OrderStatus::InPreparation, OrderStatus::Ready];
    if order.order_type == OrderType::Delivery {
        path.push(OrderStatus::OutForDelivery);
    }
    path.push(OrderStatus::Completed);
    for target in path {
        engine
            .transition(order_id, target, "staff", None, &[])
            .await
            .unwrap();
    }
}
