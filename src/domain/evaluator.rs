//! Promotion evaluator.
//!
//! `evaluate` is a pure function of the order snapshot, the promotion set and
//! the instant passed in. Promotions are applied by ascending priority then
//! id; each one is computed against the running total left by the previous
//! ones unless its kind is independent.

use super::catalog::ProductId;
use super::money::Money;
use super::order::OrderType;
use super::promotion::{
    AppliedDiscount, DiscountValue, Evaluation, OrderSnapshot, PromotionDefinition,
    PromotionKind,
};
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc};
use std::collections::BTreeMap;

/// One unit of a qualifying line.
#[derive(Debug, Clone, Copy)]
struct Unit {
    product_id: ProductId,
    price: Money,
}

struct Scoped {
    units: Vec<Unit>,
    subtotal: Money,
}

fn scoped(snapshot: &OrderSnapshot, def: &PromotionDefinition) -> Scoped {
    let mut units = Vec::new();
    let mut subtotal = Money::ZERO;
    for item in snapshot.items.iter().filter(|i| def.scope.covers(i)) {
        subtotal += item.line_total;
        for _ in 0..item.quantity {
            units.push(Unit {
                product_id: item.product_id,
                price: item.unit_price,
            });
        }
    }
    Scoped { units, subtotal }
}

fn admissible(def: &PromotionDefinition, snapshot: &OrderSnapshot, now: DateTime<Utc>) -> bool {
    if !def.is_valid_at(now) || !def.has_uses_left() {
        return false;
    }
    if matches!(def.kind, PromotionKind::FreeDelivery) && snapshot.order_type != OrderType::Delivery
    {
        return false;
    }
    def.scope.is_whole_order() || snapshot.items.iter().any(|i| def.scope.covers(i))
}

fn in_window(start: NaiveTime, end: NaiveTime, at: NaiveTime) -> bool {
    if start <= end {
        at >= start && at < end
    } else {
        // overnight, e.g. 22:00 - 02:00
        at >= start || at < end
    }
}

fn bogo(units: &[Unit]) -> Money {
    let mut by_product: BTreeMap<ProductId, Vec<Money>> = BTreeMap::new();
    for unit in units {
        by_product.entry(unit.product_id).or_default().push(unit.price);
    }
    by_product
        .values_mut()
        .map(|prices| {
            prices.sort();
            let free = prices.len() / 2;
            prices.iter().take(free).sum::<Money>()
        })
        .sum()
}

fn buy_x_get_y(units: &[Unit], buy: u32, get: u32) -> Money {
    if buy == 0 || get == 0 {
        return Money::ZERO;
    }
    let mut prices: Vec<Money> = units.iter().map(|u| u.price).collect();
    prices.sort_by(|a, b| b.cmp(a));
    let group = (buy + get) as usize;
    prices
        .chunks_exact(group)
        .map(|chunk| chunk[buy as usize..].iter().sum::<Money>())
        .sum()
}

fn second_item(units: &[Unit], percent: rust_decimal::Decimal) -> Money {
    let mut prices: Vec<Money> = units.iter().map(|u| u.price).collect();
    prices.sort_by(|a, b| b.cmp(a));
    prices
        .chunks_exact(2)
        .map(|pair| pair[1].percent(percent))
        .sum()
}

/// Discount proposed by `def`, or `None` when its conditions are not met.
fn proposed(
    def: &PromotionDefinition,
    snapshot: &OrderSnapshot,
    running: Money,
    now: DateTime<FixedOffset>,
) -> Option<Money> {
    let scope = scoped(snapshot, def);
    let base = if def.scope.is_whole_order() {
        running
    } else {
        scope.subtotal.min(running)
    };
    let positive = |m: Money| m.is_positive().then_some(m);

    match &def.kind {
        PromotionKind::Percentage { percent } => Some(base.percent(*percent)),
        PromotionKind::FixedAmount { amount } => positive((*amount).min(base)),
        PromotionKind::Bogo => positive(bogo(&scope.units)),
        PromotionKind::BuyXGetY { buy, get } => positive(buy_x_get_y(&scope.units, *buy, *get)),
        PromotionKind::Conditional {
            min_amount,
            min_quantity,
            value,
        } => {
            let amount_ok = min_amount.is_none_or(|min| running >= min);
            let quantity_ok = min_quantity.is_none_or(|min| scope.units.len() as u32 >= min);
            (amount_ok && quantity_ok).then(|| value.apply(base))
        }
        PromotionKind::FreeDelivery => Some(snapshot.delivery_fee),
        PromotionKind::HappyHour {
            start,
            end,
            days,
            value,
        } => {
            let day_ok = days.is_empty() || days.contains(&now.weekday());
            (day_ok && in_window(*start, *end, now.time())).then(|| value.apply(base))
        }
        PromotionKind::FidelityMultiplier { multiplier } => {
            (*multiplier > 1).then_some(Money::ZERO)
        }
        PromotionKind::FixedPrice { price } => positive(
            scope
                .units
                .iter()
                .map(|u| (u.price - *price).clamp_floor())
                .sum(),
        ),
        PromotionKind::SecondItem { percent } => positive(second_item(&scope.units, *percent)),
        PromotionKind::Tiered { tiers } => tiers
            .iter()
            .filter(|t| running >= t.min_amount)
            .max_by(|a, b| a.min_amount.cmp(&b.min_amount))
            .map(|t| base.percent(t.percent)),
        PromotionKind::FreeProduct { product_id } => scope
            .units
            .iter()
            .filter(|u| u.product_id == *product_id)
            .map(|u| u.price)
            .min(),
        PromotionKind::FirstOrder { value } => {
            snapshot.context.first_order.then(|| value.apply(base))
        }
        PromotionKind::Birthday { value } => {
            let today = now.date_naive();
            snapshot
                .context
                .birthday
                .filter(|b| b.month() == today.month() && b.day() == today.day())
                .map(|_| value.apply(base))
        }
        PromotionKind::Coupon { code, value } => snapshot
            .context
            .coupon_codes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(code))
            .then(|| value.apply(base)),
    }
}

fn value_suffix(value: &DiscountValue, amount: Money) -> String {
    match value {
        DiscountValue::Percent(p) => format!("-{}%", p.normalize()),
        DiscountValue::Fixed(_) => format!("-{}€", amount),
    }
}

/// Text printed on the customer ticket for an applied discount.
pub fn ticket_text(def: &PromotionDefinition, amount: Money) -> String {
    if let Some(text) = &def.ticket_text {
        return text.clone();
    }
    let suffix = match &def.kind {
        PromotionKind::Percentage { percent } => format!("-{}%", percent.normalize()),
        PromotionKind::FreeDelivery => "(free delivery)".to_string(),
        PromotionKind::FidelityMultiplier { multiplier } => format!("(cashback x{})", multiplier),
        PromotionKind::Conditional { value, .. }
        | PromotionKind::HappyHour { value, .. }
        | PromotionKind::FirstOrder { value }
        | PromotionKind::Birthday { value }
        | PromotionKind::Coupon { value, .. } => value_suffix(value, amount),
        PromotionKind::SecondItem { percent } => format!("(2nd item -{}%)", percent.normalize()),
        _ => format!("-{}€", amount),
    };
    format!("{} {}", def.name, suffix)
}

/// Computes the discount breakdown and total for an order snapshot.
pub fn evaluate(
    snapshot: &OrderSnapshot,
    promotions: &[PromotionDefinition],
    now: DateTime<FixedOffset>,
) -> Evaluation {
    let subtotal: Money = snapshot.items.iter().map(|i| i.line_total).sum();
    let mut running = subtotal;
    let mut fee_left = snapshot.delivery_fee;
    let mut loyalty_multiplier = 1;
    let mut discounts = Vec::new();

    let mut ordered: Vec<&PromotionDefinition> = promotions
        .iter()
        .filter(|def| admissible(def, snapshot, now.with_timezone(&Utc)))
        .collect();
    ordered.sort_by_key(|def| (def.priority, def.id));

    for def in ordered {
        let Some(raw) = proposed(def, snapshot, running, now) else {
            continue;
        };
        let amount = match def.kind {
            PromotionKind::FreeDelivery => {
                let amount = raw.min(fee_left).clamp_floor().round();
                fee_left -= amount;
                amount
            }
            PromotionKind::FidelityMultiplier { multiplier } => {
                loyalty_multiplier = loyalty_multiplier.max(multiplier);
                Money::ZERO.round()
            }
            _ => {
                let amount = raw.min(running).clamp_floor().round();
                running -= amount;
                amount
            }
        };
        discounts.push(AppliedDiscount {
            promotion_id: def.id,
            amount,
            ticket_text: ticket_text(def, amount),
        });
    }

    Evaluation {
        subtotal,
        delivery_fee: snapshot.delivery_fee,
        discounts,
        total: (running + fee_left).round(),
        loyalty_multiplier,
    }
}
