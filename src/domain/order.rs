use super::catalog::{CategoryId, OptionId, ProductId};
use super::money::Money;
use super::payment::{PaymentEntry, PaymentStatus};
use super::promotion::{AppliedDiscount, Evaluation, OrderSnapshot, PromotionContext};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;
pub type CustomerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    InPreparation,
    Ready,
    OutForDelivery,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    /// Whether `target` is reachable in one step from `self`.
    ///
    /// Delivery orders go through `OutForDelivery`; the others never do.
    pub fn allows(self, target: OrderStatus, order_type: OrderType) -> bool {
        use OrderStatus::*;
        let delivery = order_type == OrderType::Delivery;
        match (self, target) {
            (Completed | Canceled, _) => false,
            (_, Canceled) => true,
            (New, InPreparation) => true,
            (InPreparation, Ready) => true,
            (Ready, OutForDelivery) => delivery,
            (Ready, Completed) => !delivery,
            (OutForDelivery, Completed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InPreparation => "in_preparation",
            Self::Ready => "ready",
            Self::OutForDelivery => "out_for_delivery",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Takeaway,
    Delivery,
    Onsite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub option_id: OptionId,
    pub name: String,
    pub price_delta: Money,
}

/// A line of an order with its price frozen at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub quantity: u32,
    pub options: Vec<SelectedOption>,
    /// Base price plus option deltas.
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        category_id: CategoryId,
        name: impl Into<String>,
        base_price: Money,
        quantity: u32,
        options: Vec<SelectedOption>,
    ) -> Self {
        let unit_price = base_price + options.iter().map(|o| o.price_delta).sum::<Money>();
        Self {
            product_id,
            category_id,
            name: name.into(),
            quantity,
            options,
            unit_price,
            line_total: unit_price.times(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// Items compensated through loyalty credit after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRefund {
    pub item_indices: Vec<usize>,
    pub amount: Money,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub discounts: Vec<AppliedDiscount>,
    pub total: Money,
    pub payment_status: PaymentStatus,
    pub payments: Vec<PaymentEntry>,
    #[serde(default)]
    pub superseded_payments: Vec<PaymentEntry>,
    pub created_at: DateTime<Utc>,
    pub business_date: NaiveDate,
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub context: PromotionContext,
    pub cancellation_reason: Option<String>,
    pub loyalty_multiplier: u32,
    #[serde(default)]
    pub refunds: Vec<ItemRefund>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub version: u64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        order_type: OrderType,
        items: Vec<OrderItem>,
        delivery_fee: Money,
        customer_id: Option<CustomerId>,
        context: PromotionContext,
        created_at: DateTime<Utc>,
        business_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            items,
            status: OrderStatus::New,
            order_type,
            subtotal: Money::ZERO,
            delivery_fee,
            discounts: Vec::new(),
            total: Money::ZERO,
            payment_status: PaymentStatus::Unpaid,
            payments: Vec::new(),
            superseded_payments: Vec::new(),
            created_at,
            business_date,
            customer_id,
            context,
            cancellation_reason: None,
            loyalty_multiplier: 1,
            refunds: Vec::new(),
            history: Vec::new(),
            version: 0,
        }
    }

    /// What the promotion evaluator sees of this order.
    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            items: self.items.clone(),
            order_type: self.order_type,
            delivery_fee: self.delivery_fee,
            context: self.context.clone(),
        }
    }

    /// Totals may only move while nothing has been cooked or collected.
    pub fn pricing_is_open(&self) -> bool {
        self.status == OrderStatus::New && self.payment_status == PaymentStatus::Unpaid
    }

    pub fn apply_evaluation(&mut self, evaluation: Evaluation) {
        self.subtotal = evaluation.subtotal;
        self.discounts = evaluation.discounts;
        self.total = evaluation.total;
        self.loyalty_multiplier = evaluation.loyalty_multiplier;
    }

    pub fn paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn remaining(&self) -> Money {
        (self.total - self.paid()).clamp_floor()
    }

    pub fn discount_total(&self) -> Money {
        self.discounts.iter().map(|d| d.amount).sum()
    }

    pub fn refresh_payment_status(&mut self) {
        self.payment_status = PaymentStatus::from_amounts(self.paid(), self.total);
    }

    pub fn is_refunded(&self, index: usize) -> bool {
        self.refunds
            .iter()
            .any(|r| r.item_indices.contains(&index))
    }

    pub fn record_status(&mut self, to: OrderStatus, actor: &str, at: DateTime<Utc>) {
        self.history.push(StatusChange {
            from: self.status,
            to,
            actor: actor.to_string(),
            at,
        });
        self.status = to;
    }

    pub fn touch(&mut self) {
        self.version += 1;
    }
}
