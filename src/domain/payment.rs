//! Payment ledger of a single order.
//!
//! Entries are appended, never edited. A modification moves the whole current
//! set to `superseded_payments` and appends the replacement; a cancellation
//! appends negative reversal entries.

use super::money::{Amount, Money, TOLERANCE};
use super::order::{Order, OrderId, OrderStatus};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Check,
    MealVoucher,
    Online,
    /// Loyalty balance applied toward the order.
    Cashback,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Check => "check",
            Self::MealVoucher => "meal_voucher",
            Self::Online => "online",
            Self::Cashback => "cashback",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    pub fn from_amounts(paid: Money, total: Money) -> Self {
        if !paid.is_positive() {
            Self::Unpaid
        } else if paid >= total - TOLERANCE {
            Self::Paid
        } else {
            Self::PartiallyPaid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Collection,
    Reversal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub method: PaymentMethod,
    /// Negative for reversals.
    pub amount: Money,
    pub kind: EntryKind,
    /// Cash handed over when it exceeds `amount`.
    pub tendered: Option<Money>,
    pub idempotency_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentEntry {
    pub fn change_due(&self) -> Money {
        self.tendered
            .map(|t| (t - self.amount).clamp_floor())
            .unwrap_or(Money::ZERO)
    }
}

/// One entry of a `record_payment` / `modify_payment` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount: Amount,
    #[serde(default)]
    pub tendered: Option<Amount>,
}

impl PaymentRequest {
    pub fn new(method: PaymentMethod, amount: Amount) -> Self {
        Self {
            method,
            amount,
            tendered: None,
        }
    }

    pub fn with_tendered(mut self, tendered: Amount) -> Self {
        self.tendered = Some(tendered);
        self
    }
}

/// What the caller gets back after a payment operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
    pub paid: Money,
    pub remaining: Money,
    pub change_due: Money,
    pub version: u64,
}

impl PaymentReceipt {
    pub fn of(order: &Order, change_due: Money) -> Self {
        Self {
            order_id: order.id,
            payment_status: order.payment_status,
            paid: order.paid(),
            remaining: order.remaining(),
            change_due,
            version: order.version,
        }
    }
}

/// Money movements produced by cancelling an order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Reversed through the original tender (cash back, card refund).
    pub reversed: Money,
    /// Kept by the store and owed to the customer as loyalty credit.
    pub credited: Money,
    /// Cashback entries handed back to the loyalty account.
    pub cashback_returned: Money,
    /// Collected by a locked method; refunded upstream.
    pub upstream: Money,
}

impl RollbackOutcome {
    pub fn loyalty_credit(&self) -> Money {
        self.credited + self.cashback_returned
    }
}

fn validate_requests(requests: &[PaymentRequest]) -> Result<()> {
    if requests.is_empty() {
        return Err(EngineError::validation("at least one payment entry is required"));
    }
    for request in requests {
        if request.method == PaymentMethod::Cashback {
            return Err(EngineError::validation(
                "cashback is applied through loyalty redemption",
            ));
        }
        if let Some(tendered) = request.tendered {
            if request.method != PaymentMethod::Cash {
                return Err(EngineError::validation(
                    "a tendered amount is only valid for cash",
                ));
            }
            if tendered.money() < request.amount.money() {
                return Err(EngineError::validation(format!(
                    "tendered {} is less than the amount {}",
                    tendered.money(),
                    request.amount.money()
                )));
            }
        }
    }
    Ok(())
}

fn entry(
    request: &PaymentRequest,
    key: Option<&str>,
    at: DateTime<Utc>,
) -> PaymentEntry {
    PaymentEntry {
        method: request.method,
        amount: request.amount.money(),
        kind: EntryKind::Collection,
        tendered: request.tendered.map(Money::from),
        idempotency_key: key.map(str::to_string),
        recorded_at: at,
    }
}

/// True when a call with `key` was already applied to this order.
pub fn already_recorded(order: &Order, key: Option<&str>) -> bool {
    key.is_some_and(|k| {
        order
            .payments
            .iter()
            .chain(order.superseded_payments.iter())
            .any(|p| p.idempotency_key.as_deref() == Some(k))
    })
}

/// Appends `requests` to the order's ledger as one unit.
///
/// Returns the change due to the customer.
pub fn record(
    order: &mut Order,
    requests: &[PaymentRequest],
    key: Option<&str>,
    at: DateTime<Utc>,
) -> Result<Money> {
    if order.status == OrderStatus::Canceled {
        return Err(EngineError::validation(format!(
            "order {} is canceled",
            order.id
        )));
    }
    validate_requests(requests)?;

    let incoming: Money = requests.iter().map(|r| r.amount.money()).sum();
    check_ceiling(order, order.paid() + incoming)?;

    let entries: Vec<PaymentEntry> = requests.iter().map(|r| entry(r, key, at)).collect();
    let change = entries.iter().map(PaymentEntry::change_due).sum();
    order.payments.extend(entries);
    order.refresh_payment_status();
    Ok(change)
}

/// The tolerance absorbs rounding short of the total; once an order is
/// settled any further collection is an overpayment.
fn check_ceiling(order: &Order, attempted: Money) -> Result<()> {
    let settled = order.payment_status == PaymentStatus::Paid && attempted > order.paid();
    if settled || attempted > order.total + TOLERANCE {
        return Err(EngineError::OverpaymentRejected {
            attempted,
            total: order.total,
        });
    }
    Ok(())
}

/// Appends a cashback entry; the loyalty side is handled by the caller.
pub fn record_cashback(
    order: &mut Order,
    amount: Amount,
    key: Option<&str>,
    at: DateTime<Utc>,
) -> Result<()> {
    if order.status == OrderStatus::Canceled {
        return Err(EngineError::validation(format!(
            "order {} is canceled",
            order.id
        )));
    }
    check_ceiling(order, order.paid() + amount.money())?;
    order.payments.push(PaymentEntry {
        method: PaymentMethod::Cashback,
        amount: amount.money(),
        kind: EntryKind::Collection,
        tendered: None,
        idempotency_key: key.map(str::to_string),
        recorded_at: at,
    });
    order.refresh_payment_status();
    Ok(())
}

/// Replaces the full entry set of a paid order.
///
/// Nothing is touched unless the replacement covers the total.
pub fn replace(
    order: &mut Order,
    requests: &[PaymentRequest],
    locked: &[PaymentMethod],
    at: DateTime<Utc>,
) -> Result<Money> {
    if order.status == OrderStatus::Canceled {
        return Err(EngineError::validation(format!(
            "order {} is canceled",
            order.id
        )));
    }
    if order.payment_status != PaymentStatus::Paid {
        return Err(EngineError::validation(
            "only fully paid orders can have their payments modified",
        ));
    }
    if let Some(p) = order
        .payments
        .iter()
        .find(|p| locked.contains(&p.method) || p.method == PaymentMethod::Cashback)
    {
        return Err(EngineError::PaymentLocked(p.method));
    }
    validate_requests(requests)?;
    if let Some(r) = requests.iter().find(|r| locked.contains(&r.method)) {
        return Err(EngineError::PaymentLocked(r.method));
    }

    let replacement: Money = requests.iter().map(|r| r.amount.money()).sum();
    if replacement < order.total - TOLERANCE {
        return Err(EngineError::validation(format!(
            "replacement payments {} do not cover the total {}",
            replacement, order.total
        )));
    }
    if replacement > order.total + TOLERANCE {
        return Err(EngineError::OverpaymentRejected {
            attempted: replacement,
            total: order.total,
        });
    }

    let entries: Vec<PaymentEntry> = requests.iter().map(|r| entry(r, None, at)).collect();
    let change = entries.iter().map(PaymentEntry::change_due).sum();
    let previous = std::mem::replace(&mut order.payments, entries);
    order.superseded_payments.extend(previous);
    order.refresh_payment_status();
    Ok(change)
}

/// Reverses what was collected on an order being canceled.
///
/// Up to `missing_value` of the reversible amount is kept as loyalty credit
/// instead of being handed back. Locked methods are left untouched.
pub fn rollback(
    order: &mut Order,
    missing_value: Money,
    locked: &[PaymentMethod],
    at: DateTime<Utc>,
) -> RollbackOutcome {
    let mut outcome = RollbackOutcome::default();
    let mut reversals = Vec::new();

    let net_of = |method: PaymentMethod| -> Money {
        order
            .payments
            .iter()
            .filter(|p| p.method == method)
            .map(|p| p.amount)
            .sum()
    };

    let cashback = net_of(PaymentMethod::Cashback);
    if cashback.is_positive() {
        outcome.cashback_returned = cashback;
        reversals.push((PaymentMethod::Cashback, cashback));
    }

    let reversible: Money = order
        .payments
        .iter()
        .filter(|p| !locked.contains(&p.method) && p.method != PaymentMethod::Cashback)
        .map(|p| p.amount)
        .sum();
    outcome.upstream = order
        .payments
        .iter()
        .filter(|p| locked.contains(&p.method))
        .map(|p| p.amount)
        .sum();
    outcome.credited = missing_value.min(reversible).clamp_floor();

    // Hand back the rest, newest collections first.
    let mut to_reverse = reversible - outcome.credited;
    for p in order.payments.iter().rev() {
        if !to_reverse.is_positive() {
            break;
        }
        if p.kind != EntryKind::Collection
            || locked.contains(&p.method)
            || p.method == PaymentMethod::Cashback
        {
            continue;
        }
        let amount = p.amount.min(to_reverse);
        reversals.push((p.method, amount));
        to_reverse -= amount;
    }
    outcome.reversed = reversible - outcome.credited - to_reverse;

    order
        .payments
        .extend(reversals.into_iter().map(|(method, amount)| PaymentEntry {
            method,
            amount: -amount,
            kind: EntryKind::Reversal,
            tendered: None,
            idempotency_key: None,
            recorded_at: at,
        }));
    order.refresh_payment_status();
    outcome
}
