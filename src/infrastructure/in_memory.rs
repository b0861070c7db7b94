use crate::domain::closure::TicketZ;
use crate::domain::loyalty::LoyaltyEntry;
use crate::domain::order::{CustomerId, Order, OrderId};
use crate::domain::ports::{ClosureStore, LoyaltyStore, OrderStore};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory store for orders.
///
/// Ids are handed out from an atomic counter starting at 1.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    last_id: Arc<AtomicU64>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn store(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn orders_on(&self, date: NaiveDate) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.business_date == date)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }

    async fn business_dates(&self) -> Result<Vec<NaiveDate>> {
        let orders = self.orders.read().await;
        let dates: BTreeSet<NaiveDate> = orders.values().map(|o| o.business_date).collect();
        Ok(dates.into_iter().collect())
    }

    async fn next_id(&self) -> Result<OrderId> {
        Ok(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[derive(Default)]
struct LoyaltyLedger {
    ids: HashSet<String>,
    by_customer: HashMap<CustomerId, Vec<LoyaltyEntry>>,
}

/// Append-only loyalty entries, kept per customer in insertion order.
#[derive(Default, Clone)]
pub struct InMemoryLoyaltyStore {
    ledger: Arc<RwLock<LoyaltyLedger>>,
}

impl InMemoryLoyaltyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoyaltyStore for InMemoryLoyaltyStore {
    async fn append(&self, entry: LoyaltyEntry) -> Result<bool> {
        let mut ledger = self.ledger.write().await;
        if !ledger.ids.insert(entry.entry_id.clone()) {
            return Ok(false);
        }
        ledger
            .by_customer
            .entry(entry.customer_id)
            .or_default()
            .push(entry);
        Ok(true)
    }

    async fn entries(&self, customer_id: CustomerId) -> Result<Vec<LoyaltyEntry>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .by_customer
            .get(&customer_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Ticket Z records keyed by date. A date is closed exactly when it has a
/// ticket, so the marker and the record are one write.
#[derive(Default, Clone)]
pub struct InMemoryClosureStore {
    tickets: Arc<RwLock<BTreeMap<NaiveDate, TicketZ>>>,
}

impl InMemoryClosureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClosureStore for InMemoryClosureStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<TicketZ>> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&date).cloned())
    }

    async fn insert(&self, ticket: TicketZ) -> Result<()> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.date) {
            return Err(EngineError::AlreadyClosed(ticket.date));
        }
        tickets.insert(ticket.date, ticket);
        Ok(())
    }

    async fn is_closed(&self, date: NaiveDate) -> Result<bool> {
        let tickets = self.tickets.read().await;
        Ok(tickets.contains_key(&date))
    }

    async fn closed_dates(&self) -> Result<Vec<NaiveDate>> {
        let tickets = self.tickets.read().await;
        Ok(tickets.keys().copied().collect())
    }

    async fn last_sequence(&self) -> Result<u64> {
        let tickets = self.tickets.read().await;
        Ok(tickets.values().map(|t| t.sequence).max().unwrap_or(0))
    }
}
