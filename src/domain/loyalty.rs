use super::money::Money;
use super::order::{CustomerId, OrderId};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyKind {
    Earn,
    Redeem,
    RefundCredit,
}

/// An immutable cashback movement.
///
/// `amount` is always positive; the kind gives the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyEntry {
    /// Deterministic for engine-issued entries, so a retried operation
    /// cannot append twice.
    pub entry_id: String,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub kind: LoyaltyKind,
    pub amount: Money,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LoyaltyEntry {
    pub fn earn(customer_id: CustomerId, order_id: OrderId, amount: Money, at: DateTime<Utc>) -> Self {
        Self {
            entry_id: format!("earn:{}", order_id),
            customer_id,
            order_id,
            kind: LoyaltyKind::Earn,
            amount,
            reason: None,
            recorded_at: at,
        }
    }

    pub fn redeem(
        customer_id: CustomerId,
        order_id: OrderId,
        amount: Money,
        key: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: format!("redeem:{}:{}", order_id, key),
            customer_id,
            order_id,
            kind: LoyaltyKind::Redeem,
            amount,
            reason: None,
            recorded_at: at,
        }
    }

    pub fn refund_credit(
        entry_id: String,
        customer_id: CustomerId,
        order_id: OrderId,
        amount: Money,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id,
            customer_id,
            order_id,
            kind: LoyaltyKind::RefundCredit,
            amount,
            reason: Some(reason.to_string()),
            recorded_at: at,
        }
    }

    /// Effect of this entry on the balance.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            LoyaltyKind::Earn | LoyaltyKind::RefundCredit => self.amount,
            LoyaltyKind::Redeem => -self.amount,
        }
    }
}

/// A customer's cashback position, always derived from the entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub customer_id: CustomerId,
    pub balance: Money,
    pub entries: usize,
}

impl LoyaltyAccount {
    pub fn fold(customer_id: CustomerId, entries: &[LoyaltyEntry]) -> Self {
        let own: Vec<&LoyaltyEntry> = entries
            .iter()
            .filter(|e| e.customer_id == customer_id)
            .collect();
        Self {
            customer_id,
            balance: own.iter().map(|e| e.signed_amount()).sum(),
            entries: own.len(),
        }
    }

    pub fn ensure_can_redeem(&self, amount: Money) -> Result<()> {
        if amount > self.balance {
            return Err(EngineError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        Ok(())
    }
}

/// Cashback earned on a paid order.
pub fn earn_amount(total: Money, loyalty_percentage: Decimal, multiplier: u32) -> Money {
    total
        .percent(loyalty_percentage * Decimal::from(multiplier))
        .clamp_floor()
}
