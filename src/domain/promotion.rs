//! Promotion definitions as published by the promotion management service.
//!
//! The engine never mutates these; it only reads the set that is active when
//! an order total is computed.

use super::catalog::{CategoryId, ProductId};
use super::money::Money;
use super::order::{OrderItem, OrderType};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type PromotionId = u32;

/// A percentage or a fixed amount off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountValue {
    Percent(Decimal),
    Fixed(Money),
}

impl DiscountValue {
    /// Discount on `base`; a fixed value never exceeds it.
    pub fn apply(self, base: Money) -> Money {
        match self {
            Self::Percent(p) => base.percent(p),
            Self::Fixed(amount) => amount.min(base),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min_amount: Money,
    pub percent: Decimal,
}

/// The fifteen promotion kinds, each with its own parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromotionKind {
    Percentage {
        percent: Decimal,
    },
    FixedAmount {
        amount: Money,
    },
    /// Buy one, get the cheapest duplicate free.
    Bogo,
    BuyXGetY {
        buy: u32,
        get: u32,
    },
    Conditional {
        #[serde(default)]
        min_amount: Option<Money>,
        #[serde(default)]
        min_quantity: Option<u32>,
        value: DiscountValue,
    },
    FreeDelivery,
    HappyHour {
        start: NaiveTime,
        end: NaiveTime,
        #[serde(default)]
        days: Vec<Weekday>,
        value: DiscountValue,
    },
    FidelityMultiplier {
        multiplier: u32,
    },
    FixedPrice {
        price: Money,
    },
    SecondItem {
        percent: Decimal,
    },
    Tiered {
        tiers: Vec<Tier>,
    },
    FreeProduct {
        product_id: ProductId,
    },
    FirstOrder {
        value: DiscountValue,
    },
    Birthday {
        value: DiscountValue,
    },
    Coupon {
        code: String,
        value: DiscountValue,
    },
}

impl PromotionKind {
    /// Independent kinds ignore discounts applied before them.
    pub fn is_independent(&self) -> bool {
        matches!(self, Self::FreeDelivery | Self::FidelityMultiplier { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionScope {
    #[default]
    WholeOrder,
    Products(Vec<ProductId>),
    Categories(Vec<CategoryId>),
}

impl PromotionScope {
    pub fn covers(&self, item: &OrderItem) -> bool {
        match self {
            Self::WholeOrder => true,
            Self::Products(ids) => ids.contains(&item.product_id),
            Self::Categories(ids) => ids.contains(&item.category_id),
        }
    }

    pub fn is_whole_order(&self) -> bool {
        matches!(self, Self::WholeOrder)
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDefinition {
    pub id: PromotionId,
    pub name: String,
    pub kind: PromotionKind,
    #[serde(default)]
    pub scope: PromotionScope,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub uses: u32,
    #[serde(default)]
    pub ticket_text: Option<String>,
}

impl PromotionDefinition {
    pub fn new(id: PromotionId, name: impl Into<String>, kind: PromotionKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            scope: PromotionScope::WholeOrder,
            priority: 0,
            valid_from: None,
            valid_until: None,
            active: true,
            max_uses: None,
            uses: 0,
            ticket_text: None,
        }
    }

    pub fn with_scope(mut self, scope: PromotionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_window(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    pub fn with_cap(mut self, max_uses: u32, uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self.uses = uses;
        self
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from.is_none_or(|from| now >= from)
            && self.valid_until.is_none_or(|until| now <= until)
    }

    pub fn has_uses_left(&self) -> bool {
        self.max_uses.is_none_or(|max| self.uses < max)
    }
}

/// Customer facts some promotions depend on, captured with the order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromotionContext {
    #[serde(default)]
    pub first_order: bool,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub coupon_codes: Vec<String>,
}

/// The order contents a promotion evaluation depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub items: Vec<OrderItem>,
    pub order_type: OrderType,
    pub delivery_fee: Money,
    pub context: PromotionContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub promotion_id: PromotionId,
    pub amount: Money,
    pub ticket_text: String,
}

/// Result of evaluating promotions against an order snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub discounts: Vec<AppliedDiscount>,
    pub total: Money,
    pub loyalty_multiplier: u32,
}
