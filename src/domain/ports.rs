use super::catalog::{Product, ProductId, Settings};
use super::closure::TicketZ;
use super::loyalty::LoyaltyEntry;
use super::order::{CustomerId, Order, OrderId};
use super::promotion::PromotionDefinition;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn store(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;
    async fn orders_on(&self, date: NaiveDate) -> Result<Vec<Order>>;
    /// Distinct business dates that have at least one order, ascending.
    async fn business_dates(&self) -> Result<Vec<NaiveDate>>;
    async fn next_id(&self) -> Result<OrderId>;
}

#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Appends `entry` unless one with the same `entry_id` exists.
    ///
    /// Returns `false` when the entry was already there.
    async fn append(&self, entry: LoyaltyEntry) -> Result<bool>;
    async fn entries(&self, customer_id: CustomerId) -> Result<Vec<LoyaltyEntry>>;
}

#[async_trait]
pub trait ClosureStore: Send + Sync {
    async fn get(&self, date: NaiveDate) -> Result<Option<TicketZ>>;
    /// Persists the ticket and the closed-day marker in a single write.
    ///
    /// Fails with `AlreadyClosed` if the date already has a ticket.
    async fn insert(&self, ticket: TicketZ) -> Result<()>;
    async fn is_closed(&self, date: NaiveDate) -> Result<bool>;
    async fn closed_dates(&self) -> Result<Vec<NaiveDate>>;
    /// Highest Z number issued so far, 0 when none.
    async fn last_sequence(&self) -> Result<u64>;
}

/// Product data at order-creation time.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>>;
}

/// Promotion definitions currently published.
#[async_trait]
pub trait PromotionSource: Send + Sync {
    async fn active_promotions(&self, now: DateTime<Utc>) -> Result<Vec<PromotionDefinition>>;
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn settings(&self) -> Result<Settings>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type LoyaltyStoreBox = Box<dyn LoyaltyStore>;
pub type ClosureStoreBox = Box<dyn ClosureStore>;
pub type CatalogBox = Box<dyn Catalog>;
pub type PromotionSourceBox = Box<dyn PromotionSource>;
pub type SettingsSourceBox = Box<dyn SettingsSource>;
pub type ClockBox = Box<dyn Clock>;
