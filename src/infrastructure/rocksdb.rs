use crate::domain::closure::TicketZ;
use crate::domain::loyalty::LoyaltyEntry;
use crate::domain::order::{CustomerId, Order, OrderId};
use crate::domain::ports::{ClosureStore, LoyaltyStore, OrderStore};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for orders, keyed by big-endian order id.
pub const CF_ORDERS: &str = "orders";
/// Index of orders by business date: `YYYY-MM-DD` followed by the order id.
pub const CF_ORDER_DATES: &str = "order_dates";
/// Loyalty entries keyed by big-endian customer id followed by the entry id.
pub const CF_LOYALTY: &str = "loyalty";
/// Ticket Z records keyed by date.
pub const CF_CLOSURES: &str = "closures";
/// Closed-day markers holding the Z number, written with the ticket.
pub const CF_CLOSED_DAYS: &str = "closed_days";
/// Counters.
pub const CF_META: &str = "meta";

const LAST_ORDER_ID: &[u8] = b"last_order_id";

/// A persistent store implementation using RocksDB.
///
/// Implements all three storage ports over separate column families.
/// Cloning shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    /// Guards read-modify-write sequences (id counter, idempotent appends).
    writes: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [
            CF_ORDERS,
            CF_ORDER_DATES,
            CF_LOYALTY,
            CF_CLOSURES,
            CF_CLOSED_DAYS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;
        Ok(Self {
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::Internal(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn load_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_cf(cf, order_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Values of every key in `cf` starting with `prefix`.
    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let mut found = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push((key, value));
        }
        Ok(found)
    }
}

fn date_key(date: NaiveDate) -> Vec<u8> {
    date.format("%Y-%m-%d").to_string().into_bytes()
}

fn parse_date_key(key: &[u8]) -> Result<NaiveDate> {
    let text = std::str::from_utf8(key.get(..10).unwrap_or(key))
        .map_err(|e| EngineError::Internal(Box::new(e)))?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| EngineError::Internal(Box::new(e)))
}

fn loyalty_key(customer_id: CustomerId, entry_id: &str) -> Vec<u8> {
    let mut key = customer_id.to_be_bytes().to_vec();
    key.extend_from_slice(entry_id.as_bytes());
    key
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn store(&self, order: Order) -> Result<()> {
        let orders = self.cf(CF_ORDERS)?;
        let dates = self.cf(CF_ORDER_DATES)?;

        let mut index = date_key(order.business_date);
        index.extend_from_slice(&order.id.to_be_bytes());

        let mut batch = WriteBatch::default();
        batch.put_cf(orders, order.id.to_be_bytes(), serde_json::to_vec(&order)?);
        batch.put_cf(dates, index, b"");
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.load_order(order_id)
    }

    async fn orders_on(&self, date: NaiveDate) -> Result<Vec<Order>> {
        let dates = self.cf(CF_ORDER_DATES)?;
        let mut orders = Vec::new();
        for (key, _) in self.scan_prefix(dates, &date_key(date))? {
            let id_bytes: [u8; 8] = key
                .get(10..18)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    EngineError::Internal(Box::new(std::io::Error::other(
                        "malformed order date index key",
                    )))
                })?;
            if let Some(order) = self.load_order(OrderId::from_be_bytes(id_bytes))? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn business_dates(&self) -> Result<Vec<NaiveDate>> {
        let dates = self.cf(CF_ORDER_DATES)?;
        let mut found: Vec<NaiveDate> = Vec::new();
        for item in self.db.iterator_cf(dates, IteratorMode::Start) {
            let (key, _) = item?;
            let date = parse_date_key(&key)?;
            if found.last() != Some(&date) {
                found.push(date);
            }
        }
        Ok(found)
    }

    async fn next_id(&self) -> Result<OrderId> {
        let _guard = self.writes.lock().await;
        let meta = self.cf(CF_META)?;
        let last = match self.db.get_cf(meta, LAST_ORDER_ID)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    EngineError::Internal(Box::new(std::io::Error::other(
                        "malformed order id counter",
                    )))
                })?;
                OrderId::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = last + 1;
        self.db.put_cf(meta, LAST_ORDER_ID, next.to_be_bytes())?;
        Ok(next)
    }
}

#[async_trait]
impl LoyaltyStore for RocksDBStore {
    async fn append(&self, entry: LoyaltyEntry) -> Result<bool> {
        let _guard = self.writes.lock().await;
        let cf = self.cf(CF_LOYALTY)?;
        let key = loyalty_key(entry.customer_id, &entry.entry_id);
        if self.db.get_pinned_cf(cf, &key)?.is_some() {
            return Ok(false);
        }
        self.db.put_cf(cf, key, serde_json::to_vec(&entry)?)?;
        Ok(true)
    }

    async fn entries(&self, customer_id: CustomerId) -> Result<Vec<LoyaltyEntry>> {
        let cf = self.cf(CF_LOYALTY)?;
        let mut entries = self
            .scan_prefix(cf, &customer_id.to_be_bytes())?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice::<LoyaltyEntry>(&value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.recorded_at);
        Ok(entries)
    }
}

#[async_trait]
impl ClosureStore for RocksDBStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<TicketZ>> {
        let cf = self.cf(CF_CLOSURES)?;
        match self.db.get_cf(cf, date_key(date))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, ticket: TicketZ) -> Result<()> {
        let _guard = self.writes.lock().await;
        let closures = self.cf(CF_CLOSURES)?;
        let closed = self.cf(CF_CLOSED_DAYS)?;
        let key = date_key(ticket.date);
        if self.db.get_pinned_cf(closed, &key)?.is_some() {
            return Err(EngineError::AlreadyClosed(ticket.date));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(closures, &key, serde_json::to_vec(&ticket)?);
        batch.put_cf(closed, &key, ticket.sequence.to_be_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn is_closed(&self, date: NaiveDate) -> Result<bool> {
        let cf = self.cf(CF_CLOSED_DAYS)?;
        Ok(self.db.get_pinned_cf(cf, date_key(date))?.is_some())
    }

    async fn closed_dates(&self) -> Result<Vec<NaiveDate>> {
        let cf = self.cf(CF_CLOSED_DAYS)?;
        let mut dates = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            dates.push(parse_date_key(&key)?);
        }
        Ok(dates)
    }

    async fn last_sequence(&self) -> Result<u64> {
        let cf = self.cf(CF_CLOSED_DAYS)?;
        let mut last = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            if let Ok(raw) = <[u8; 8]>::try_from(value.as_ref()) {
                last = last.max(u64::from_be_bytes(raw));
            }
        }
        Ok(last)
    }
}
