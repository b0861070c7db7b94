#![allow(dead_code)]

use caisse::application::{Collaborators, NewItem, NewOrder, OrderEngine, Stores};
use caisse::config::EngineConfig;
use caisse::domain::catalog::{Product, ProductOption, Settings};
use caisse::domain::money::{Amount, Money};
use caisse::domain::order::{CustomerId, OrderId, OrderStatus, OrderType};
use caisse::domain::payment::{PaymentMethod, PaymentRequest};
use caisse::domain::promotion::{PromotionContext, PromotionDefinition};
use caisse::infrastructure::in_memory::{InMemoryClosureStore, InMemoryLoyaltyStore, InMemoryOrderStore};
use caisse::infrastructure::sources::{ManualClock, StaticCatalog, StaticPromotions, StaticSettings};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;

pub fn money(value: Decimal) -> Money {
    Money::new(value)
}

pub fn product(id: u32, name: &str, category_id: u32, price: Decimal) -> Product {
    Product {
        id,
        name: name.to_string(),
        category_id,
        price: money(price),
        options: vec![],
    }
}

/// Burger 12.00 (+ bacon 1.50), frites 3.50, soda 2.50, salade 6.50,
/// pizza 17.00.
pub fn catalog() -> Vec<Product> {
    let mut burger = product(1, "Burger", 1, Decimal::new(1200, 2));
    burger.options.push(ProductOption {
        id: 10,
        name: "Bacon".to_string(),
        price_delta: money(Decimal::new(150, 2)),
    });
    vec![
        burger,
        product(2, "Frites", 2, Decimal::new(350, 2)),
        product(3, "Soda", 3, Decimal::new(250, 2)),
        product(4, "Salade", 1, Decimal::new(650, 2)),
        product(5, "Pizza", 1, Decimal::new(1700, 2)),
    ]
}

/// 2024-01-10 11:00 UTC, a Wednesday.
pub fn opening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap()
}

pub fn engine_with(
    promotions: Vec<PromotionDefinition>,
    settings: Settings,
) -> (OrderEngine, ManualClock) {
    let clock = ManualClock::new(opening());
    let engine = OrderEngine::new(
        Stores {
            orders: Box::new(InMemoryOrderStore::new()),
            loyalty: Box::new(InMemoryLoyaltyStore::new()),
            closures: Box::new(InMemoryClosureStore::new()),
        },
        Collaborators {
            catalog: Box::new(StaticCatalog::new(catalog())),
            promotions: Box::new(StaticPromotions::new(promotions)),
            settings: Box::new(StaticSettings::new(settings)),
            clock: Box::new(clock.clone()),
        },
        EngineConfig::default(),
    );
    (engine, clock)
}

pub fn engine() -> (OrderEngine, ManualClock) {
    engine_with(
        vec![],
        Settings {
            loyalty_percentage: Decimal::new(5, 0),
            vat_rate: Decimal::TEN,
        },
    )
}

pub fn new_order(order_type: OrderType, products: &[u32], customer_id: Option<CustomerId>) -> NewOrder {
    NewOrder {
        order_type,
        items: products
            .iter()
            .map(|&product_id| NewItem {
                product_id,
                quantity: 1,
                option_ids: vec![],
            })
            .collect(),
        delivery_fee: Money::ZERO,
        customer_id,
        context: PromotionContext::default(),
    }
}

pub fn pay(method: PaymentMethod, value: Decimal) -> PaymentRequest {
    PaymentRequest::new(method, Amount::new(value).unwrap())
}

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

/// Writes the JSON collaborator file used by the CLI tests.
pub fn write_catalog(path: &Path, promotions: serde_json::Value) {
    let data = serde_json::json!({
        "settings": {"loyalty_percentage": "5", "vat_rate": "10"},
        "products": catalog(),
        "promotions": promotions,
    });
    std::fs::write(path, serde_json::to_vec_pretty(&data).unwrap()).unwrap();
}

pub fn write_commands(path: &Path, commands: &[serde_json::Value]) {
    let mut file = std::fs::File::create(path).unwrap();
    for command in commands {
        writeln!(file, "{}", command).unwrap();
    }
}
