//! Ticket Z: the immutable end-of-day register report.

use super::money::Money;
use super::order::{Order, OrderStatus, OrderType};
use super::payment::{EntryKind, PaymentMethod};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub amount: Money,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTypeTotal {
    pub order_type: OrderType,
    pub amount: Money,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketZ {
    pub date: NaiveDate,
    /// Z number, 1 for the first closure ever.
    pub sequence: u64,
    pub completed_orders: usize,
    pub canceled_orders: usize,
    /// Sum of completed order totals, VAT included.
    pub gross_sales: Money,
    pub discount_total: Money,
    pub vat_rate: Decimal,
    pub vat_collected: Money,
    pub net_sales: Money,
    /// Collected on completed orders.
    pub total_collected: Money,
    /// Completed but not fully paid.
    pub total_unpaid: Money,
    pub canceled_amount: Money,
    /// Still held on canceled orders: missing items credited to loyalty and
    /// locked payments awaiting an upstream refund.
    pub retained_on_cancellation: Money,
    /// Net per method over completed and canceled orders; sums to
    /// `total_collected + retained_on_cancellation`.
    pub payments_by_method: Vec<MethodTotal>,
    pub sales_by_order_type: Vec<OrderTypeTotal>,
    pub closed_by: String,
    pub closed_at: DateTime<Utc>,
}

/// What callers check before attempting a closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub date: NaiveDate,
    pub is_closed: bool,
    pub pending_orders: usize,
    /// An earlier business day with orders was never closed.
    pub needs_closure: bool,
    pub oldest_unclosed_date: Option<NaiveDate>,
}

/// VAT contained in a VAT-inclusive amount.
pub fn included_vat(gross: Money, rate: Decimal) -> Money {
    if rate.is_zero() {
        return Money::ZERO.round();
    }
    Money::new(gross.value() * rate / (Decimal::ONE_HUNDRED + rate)).round()
}

/// Sums the terminal orders of `date` into a Ticket Z.
///
/// The caller guarantees every order is terminal and dated `date`.
pub fn aggregate(
    date: NaiveDate,
    sequence: u64,
    orders: &[Order],
    vat_rate: Decimal,
    closed_by: &str,
    closed_at: DateTime<Utc>,
) -> TicketZ {
    let mut completed_orders = 0;
    let mut canceled_orders = 0;
    let mut gross_sales = Money::ZERO;
    let mut discount_total = Money::ZERO;
    let mut total_collected = Money::ZERO;
    let mut total_unpaid = Money::ZERO;
    let mut canceled_amount = Money::ZERO;
    let mut retained_on_cancellation = Money::ZERO;
    let mut by_method: BTreeMap<PaymentMethod, (Money, usize)> = BTreeMap::new();
    let mut by_type: BTreeMap<OrderType, (Money, usize)> = BTreeMap::new();

    for order in orders {
        match order.status {
            OrderStatus::Completed => {
                completed_orders += 1;
                gross_sales += order.total;
                discount_total += order.discount_total();
                total_collected += order.paid();
                total_unpaid += order.remaining();
                for payment in &order.payments {
                    let slot = by_method.entry(payment.method).or_default();
                    slot.0 += payment.amount;
                    if payment.kind == EntryKind::Collection {
                        slot.1 += 1;
                    }
                }
                let slot = by_type.entry(order.order_type).or_default();
                slot.0 += order.total;
                slot.1 += 1;
            }
            OrderStatus::Canceled => {
                canceled_orders += 1;
                canceled_amount += order.total;
                retained_on_cancellation += order.paid();
                // Reversals net out; only what stayed in the drawer remains.
                for payment in &order.payments {
                    by_method.entry(payment.method).or_default().0 += payment.amount;
                }
            }
            _ => {}
        }
    }

    let vat_collected = included_vat(gross_sales, vat_rate);
    TicketZ {
        date,
        sequence,
        completed_orders,
        canceled_orders,
        gross_sales: gross_sales.round(),
        discount_total: discount_total.round(),
        vat_rate,
        vat_collected,
        net_sales: (gross_sales - vat_collected).round(),
        total_collected: total_collected.round(),
        total_unpaid: total_unpaid.round(),
        canceled_amount: canceled_amount.round(),
        retained_on_cancellation: retained_on_cancellation.round(),
        payments_by_method: by_method
            .into_iter()
            .filter(|(_, (amount, count))| *count > 0 || !amount.is_zero())
            .map(|(method, (amount, count))| MethodTotal {
                method,
                amount: amount.round(),
                count,
            })
            .collect(),
        sales_by_order_type: by_type
            .into_iter()
            .map(|(order_type, (amount, count))| OrderTypeTotal {
                order_type,
                amount: amount.round(),
                count,
            })
            .collect(),
        closed_by: closed_by.to_string(),
        closed_at,
    }
}
