use super::engine::OrderEngine;
use super::lifecycle::missing_value;
use crate::domain::loyalty::{LoyaltyAccount, LoyaltyEntry};
use crate::domain::money::{Amount, Money};
use crate::domain::order::{CustomerId, ItemRefund, OrderId, OrderStatus};
use crate::domain::payment::{self, PaymentMethod, PaymentReceipt, PaymentRequest, PaymentStatus};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of compensating items through cashback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub amount: Money,
    /// Customer balance after the credit.
    pub balance: Money,
}

impl OrderEngine {
    /// Records one or more payment entries as a unit.
    ///
    /// With an `idempotency_key` that was already applied, returns the
    /// current receipt and changes nothing.
    pub async fn record_payment(
        &self,
        order_id: OrderId,
        requests: Vec<PaymentRequest>,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentReceipt> {
        let result: Result<PaymentReceipt> = async {
            let settings = self.settings.settings().await?;
            let now = self.clock.now();

            let (_lease, mut order) = self.lease(order_id).await?;
            if payment::already_recorded(&order, idempotency_key) {
                let change = order
                    .payments
                    .iter()
                    .filter(|p| p.idempotency_key.as_deref() == idempotency_key)
                    .map(|p| p.change_due())
                    .sum();
                return Ok(PaymentReceipt::of(&order, change));
            }
            self.ensure_day_open(order.business_date).await?;

            let change = payment::record(&mut order, &requests, idempotency_key, now)?;
            self.earn_if_due(&order, &settings, now).await?;
            order.touch();
            self.orders.store(order.clone()).await?;
            info!(
                order_id,
                paid = %order.paid(),
                total = %order.total,
                status = ?order.payment_status,
                "payment recorded"
            );
            Ok(PaymentReceipt::of(&order, change))
        }
        .await;
        result.inspect_err(|e| warn!(order_id, error = %e, "payment rejected"))
    }

    /// Swaps the whole payment set of a paid order for `requests`.
    pub async fn modify_payment(
        &self,
        order_id: OrderId,
        requests: Vec<PaymentRequest>,
    ) -> Result<PaymentReceipt> {
        let result: Result<PaymentReceipt> = async {
            let now = self.clock.now();
            let (_lease, mut order) = self.lease(order_id).await?;
            self.ensure_day_open(order.business_date).await?;

            let change = payment::replace(&mut order, &requests, &self.config.locked_methods, now)?;
            order.touch();
            self.orders.store(order.clone()).await?;
            info!(order_id, entries = order.payments.len(), "payments replaced");
            Ok(PaymentReceipt::of(&order, change))
        }
        .await;
        result.inspect_err(|e| warn!(order_id, error = %e, "payment modification rejected"))
    }

    /// Compensates missing or defective items with cashback.
    ///
    /// The original payment entries stay as they are. Like every other
    /// mutation it is refused once the order's day has a Ticket Z.
    pub async fn refund_items(
        &self,
        order_id: OrderId,
        item_indices: Vec<usize>,
        reason: &str,
    ) -> Result<RefundReceipt> {
        let result: Result<RefundReceipt> = async {
            let now = self.clock.now();
            let (_lease, mut order) = self.lease(order_id).await?;
            self.ensure_day_open(order.business_date).await?;

            if order.status != OrderStatus::Completed || order.payment_status != PaymentStatus::Paid {
                return Err(EngineError::validation(format!(
                    "order {} must be completed and paid to refund items",
                    order_id
                )));
            }
            let customer_id = order.customer_id.ok_or_else(|| {
                EngineError::validation(format!("order {} has no customer to credit", order_id))
            })?;
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(EngineError::validation("a refund reason is required"));
            }
            if item_indices.is_empty() {
                return Err(EngineError::validation("no item to refund"));
            }
            if let Some(index) = item_indices.iter().find(|i| order.is_refunded(**i)) {
                return Err(EngineError::validation(format!(
                    "item {} was already refunded",
                    index
                )));
            }
            let amount = missing_value(&order, &item_indices)?;

            let entry = LoyaltyEntry::refund_credit(
                format!("refund:{}:{}", order_id, order.refunds.len() + 1),
                customer_id,
                order_id,
                amount,
                reason,
                now,
            );
            self.loyalty.append(entry).await?;

            order.refunds.push(ItemRefund {
                item_indices,
                amount,
                reason: reason.to_string(),
                at: now,
            });
            order.touch();
            self.orders.store(order).await?;

            let balance = self.loyalty_balance(customer_id).await?.balance;
            info!(order_id, customer_id, %amount, %balance, "items refunded to cashback");
            Ok(RefundReceipt {
                order_id,
                customer_id,
                amount,
                balance,
            })
        }
        .await;
        result.inspect_err(|e| warn!(order_id, error = %e, "item refund rejected"))
    }

    /// Pays part of an order with the customer's cashback balance.
    pub async fn redeem_cashback(
        &self,
        order_id: OrderId,
        amount: Amount,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentReceipt> {
        let result: Result<PaymentReceipt> = async {
            let settings = self.settings.settings().await?;
            let now = self.clock.now();

            let (_lease, mut order) = self.lease(order_id).await?;
            if payment::already_recorded(&order, idempotency_key) {
                return Ok(PaymentReceipt::of(&order, Money::ZERO));
            }
            self.ensure_day_open(order.business_date).await?;
            let customer_id = order.customer_id.ok_or_else(|| {
                EngineError::validation(format!("order {} has no customer", order_id))
            })?;

            // Checks the overpayment guard before touching the balance.
            let mut updated = order.clone();
            payment::record_cashback(&mut updated, amount, idempotency_key, now)?;

            let _customer = self.customer_locks.lock(customer_id).await;
            let key = idempotency_key.map(str::to_string).unwrap_or_else(|| {
                let n = order
                    .payments
                    .iter()
                    .filter(|p| p.method == PaymentMethod::Cashback)
                    .count();
                (n + 1).to_string()
            });
            let entry = LoyaltyEntry::redeem(customer_id, order_id, amount.money(), &key, now);
            let entries = self.loyalty.entries(customer_id).await?;
            // A previous attempt may have debited the balance without storing the order.
            if !entries.iter().any(|e| e.entry_id == entry.entry_id) {
                LoyaltyAccount::fold(customer_id, &entries).ensure_can_redeem(amount.money())?;
            }
            self.loyalty.append(entry).await?;

            order = updated;
            self.earn_if_due(&order, &settings, now).await?;
            order.touch();
            self.orders.store(order.clone()).await?;
            info!(order_id, customer_id, amount = %amount.money(), "cashback redeemed");
            Ok(PaymentReceipt::of(&order, Money::ZERO))
        }
        .await;
        result.inspect_err(|e| warn!(order_id, error = %e, "cashback redemption rejected"))
    }
}
