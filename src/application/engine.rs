use super::locks::{DayGate, KeyGuard, KeyedLocks, SharedDay};
use crate::config::EngineConfig;
use crate::domain::catalog::{OptionId, ProductId, Settings};
use crate::domain::evaluator;
use crate::domain::loyalty::{self, LoyaltyAccount, LoyaltyEntry};
use crate::domain::money::Money;
use crate::domain::order::{CustomerId, Order, OrderId, OrderItem, OrderStatus, OrderType, SelectedOption};
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{
    CatalogBox, ClockBox, ClosureStoreBox, LoyaltyStoreBox, OrderStoreBox, PromotionSourceBox,
    SettingsSourceBox,
};
use crate::domain::promotion::{PromotionContext, PromotionDefinition};
use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Persistence backends used by the engine.
pub struct Stores {
    pub orders: OrderStoreBox,
    pub loyalty: LoyaltyStoreBox,
    pub closures: ClosureStoreBox,
}

/// Read-only collaborators, always consulted before any lock is taken.
pub struct Collaborators {
    pub catalog: CatalogBox,
    pub promotions: PromotionSourceBox,
    pub settings: SettingsSourceBox,
    pub clock: ClockBox,
}

/// A line requested by a client, resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub option_ids: Vec<OptionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_type: OrderType,
    pub items: Vec<NewItem>,
    #[serde(default)]
    pub delivery_fee: Money,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub context: PromotionContext,
}

/// Guards held for the duration of a single order mutation.
pub(crate) struct OrderLease {
    _day: SharedDay,
    _order: KeyGuard<OrderId>,
}

/// The order lifecycle and payment reconciliation engine.
///
/// Every mutation of an order runs under that order's lock and the shared
/// side of its business day's gate. Reads go straight to the stores.
pub struct OrderEngine {
    pub(crate) orders: OrderStoreBox,
    pub(crate) loyalty: LoyaltyStoreBox,
    pub(crate) closures: ClosureStoreBox,
    pub(crate) catalog: CatalogBox,
    pub(crate) promotions: PromotionSourceBox,
    pub(crate) settings: SettingsSourceBox,
    pub(crate) clock: ClockBox,
    pub(crate) config: EngineConfig,
    pub(crate) order_locks: KeyedLocks<OrderId>,
    pub(crate) customer_locks: KeyedLocks<CustomerId>,
    pub(crate) days: DayGate,
    /// Serializes Z number allocation across dates.
    pub(crate) closing: Mutex<()>,
}

impl OrderEngine {
    pub fn new(stores: Stores, collaborators: Collaborators, config: EngineConfig) -> Self {
        Self {
            orders: stores.orders,
            loyalty: stores.loyalty,
            closures: stores.closures,
            catalog: collaborators.catalog,
            promotions: collaborators.promotions,
            settings: collaborators.settings,
            clock: collaborators.clock,
            config,
            order_locks: KeyedLocks::new(),
            customer_locks: KeyedLocks::new(),
            days: DayGate::new(),
            closing: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Order locks currently held or awaited.
    pub fn active_order_locks(&self) -> usize {
        self.order_locks.len()
    }

    /// Creates an order priced from the catalog with promotions applied.
    pub async fn create_order(&self, request: NewOrder) -> Result<Order> {
        let now = self.clock.now();
        let result = self.create_order_at(request, now).await;
        result.inspect_err(|e| warn!(error = %e, "order creation rejected"))
    }

    async fn create_order_at(&self, request: NewOrder, now: DateTime<Utc>) -> Result<Order> {
        if request.delivery_fee.is_negative() {
            return Err(EngineError::validation("delivery fee cannot be negative"));
        }
        if request.order_type != OrderType::Delivery && !request.delivery_fee.is_zero() {
            return Err(EngineError::validation(
                "a delivery fee is only valid for delivery orders",
            ));
        }
        let items = self.resolve_items(&request.items).await?;
        let promotions = self.promotions.active_promotions(now).await?;

        let date = self.config.business_date(now);
        let _day = self.days.shared(date).await;
        self.ensure_day_open(date).await?;

        let id = self.orders.next_id().await?;
        let mut order = Order::new(
            id,
            request.order_type,
            items,
            request.delivery_fee,
            request.customer_id,
            request.context,
            now,
            date,
        );
        self.price(&mut order, &promotions, now);
        self.orders.store(order.clone()).await?;
        info!(order_id = id, total = %order.total, %date, "order created");
        Ok(order)
    }

    /// Replaces the line items of an order that is still new and unpaid.
    pub async fn update_items(&self, order_id: OrderId, items: Vec<NewItem>) -> Result<Order> {
        let now = self.clock.now();
        let result: Result<Order> = async {
            let items = self.resolve_items(&items).await?;
            let promotions = self.promotions.active_promotions(now).await?;

            let (_lease, mut order) = self.lease(order_id).await?;
            self.ensure_day_open(order.business_date).await?;
            if !order.pricing_is_open() {
                return Err(EngineError::validation(format!(
                    "items of order {} can no longer change",
                    order_id
                )));
            }
            order.items = items;
            self.price(&mut order, &promotions, now);
            order.touch();
            self.orders.store(order.clone()).await?;
            info!(order_id, total = %order.total, "order items updated");
            Ok(order)
        }
        .await;
        result.inspect_err(|e| warn!(order_id, error = %e, "item update rejected"))
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.load(order_id).await
    }

    pub async fn loyalty_balance(&self, customer_id: CustomerId) -> Result<LoyaltyAccount> {
        let entries = self.loyalty.entries(customer_id).await?;
        Ok(LoyaltyAccount::fold(customer_id, &entries))
    }

    pub async fn loyalty_entries(&self, customer_id: CustomerId) -> Result<Vec<LoyaltyEntry>> {
        self.loyalty.entries(customer_id).await
    }

    pub(crate) async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))
    }

    /// Takes the day gate (shared) then the order lock, and reloads the order
    /// under them.
    pub(crate) async fn lease(&self, order_id: OrderId) -> Result<(OrderLease, Order)> {
        let date = self.load(order_id).await?.business_date;
        let day = self.days.shared(date).await;
        let order = self.order_locks.lock(order_id).await;
        let current = self.load(order_id).await?;
        Ok((
            OrderLease {
                _day: day,
                _order: order,
            },
            current,
        ))
    }

    pub(crate) async fn ensure_day_open(&self, date: NaiveDate) -> Result<()> {
        if self.closures.is_closed(date).await? {
            return Err(EngineError::DayClosed(date));
        }
        Ok(())
    }

    pub(crate) fn price(&self, order: &mut Order, promotions: &[PromotionDefinition], now: DateTime<Utc>) {
        let evaluation = evaluator::evaluate(&order.snapshot(), promotions, self.config.local(now));
        order.apply_evaluation(evaluation);
    }

    /// Credits cashback once a completed order is fully paid.
    ///
    /// The entry id is derived from the order, so calling this again is a
    /// no-op.
    pub(crate) async fn earn_if_due(
        &self,
        order: &Order,
        settings: &Settings,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let Some(customer_id) = order.customer_id else {
            return Ok(());
        };
        if order.status != OrderStatus::Completed || order.payment_status != PaymentStatus::Paid {
            return Ok(());
        }
        let amount = loyalty::earn_amount(
            order.total,
            settings.loyalty_percentage,
            order.loyalty_multiplier,
        );
        if !amount.is_positive() {
            return Ok(());
        }
        if self
            .loyalty
            .append(LoyaltyEntry::earn(customer_id, order.id, amount, at))
            .await?
        {
            info!(order_id = order.id, customer_id, %amount, "cashback earned");
        }
        Ok(())
    }

    async fn resolve_items(&self, requested: &[NewItem]) -> Result<Vec<OrderItem>> {
        if requested.is_empty() {
            return Err(EngineError::validation("an order needs at least one item"));
        }
        let mut items = Vec::with_capacity(requested.len());
        for line in requested {
            if line.quantity == 0 {
                return Err(EngineError::validation(format!(
                    "quantity of product {} must be positive",
                    line.product_id
                )));
            }
            let product = self
                .catalog
                .product(line.product_id)
                .await?
                .ok_or_else(|| EngineError::not_found(format!("product {}", line.product_id)))?;

            let mut seen = HashSet::new();
            let mut options = Vec::with_capacity(line.option_ids.len());
            for option_id in &line.option_ids {
                if !seen.insert(*option_id) {
                    return Err(EngineError::validation(format!(
                        "option {} selected twice for product {}",
                        option_id, product.id
                    )));
                }
                let option = product.option(*option_id).ok_or_else(|| {
                    EngineError::validation(format!(
                        "option {} does not belong to product {}",
                        option_id, product.id
                    ))
                })?;
                options.push(SelectedOption {
                    option_id: option.id,
                    name: option.name.clone(),
                    price_delta: option.price_delta,
                });
            }
            items.push(OrderItem::new(
                product.id,
                product.category_id,
                product.name.clone(),
                product.price,
                line.quantity,
                options,
            ));
        }
        Ok(items)
    }
}
