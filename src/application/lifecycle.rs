use super::engine::OrderEngine;
use crate::domain::loyalty::LoyaltyEntry;
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment;
use crate::error::{EngineError, Result};
use std::collections::HashSet;
use tracing::{info, warn};

impl OrderEngine {
    /// Moves an order to `target`.
    ///
    /// Asking for the current status again succeeds without side effects.
    /// Cancelling needs a reason and rolls the payments back; `missing_items`
    /// are indices of lines never delivered, whose value goes to the
    /// customer's cashback instead of a reversal.
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor: &str,
        reason: Option<&str>,
        missing_items: &[usize],
    ) -> Result<Order> {
        let result = self
            .transition_inner(order_id, target, actor, reason, missing_items)
            .await;
        result.inspect_err(|e| warn!(order_id, %target, actor, error = %e, "transition rejected"))
    }

    async fn transition_inner(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor: &str,
        reason: Option<&str>,
        missing_items: &[usize],
    ) -> Result<Order> {
        let settings = self.settings.settings().await?;
        let now = self.clock.now();

        let (_lease, mut order) = self.lease(order_id).await?;
        if order.status == target {
            return Ok(order);
        }
        if !order.status.allows(target, order.order_type) {
            return Err(EngineError::IllegalTransition {
                from: order.status,
                to: target,
            });
        }
        self.ensure_day_open(order.business_date).await?;

        let from = order.status;
        match target {
            OrderStatus::Canceled => {
                let reason = reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| EngineError::validation("a cancellation reason is required"))?;
                self.cancel(&mut order, actor, reason, missing_items, now)
                    .await?;
            }
            OrderStatus::Completed => {
                order.record_status(target, actor, now);
                self.earn_if_due(&order, &settings, now).await?;
            }
            _ => order.record_status(target, actor, now),
        }

        order.touch();
        self.orders.store(order.clone()).await?;
        info!(order_id, %from, to = %target, actor, "order transitioned");
        Ok(order)
    }

    async fn cancel(
        &self,
        order: &mut Order,
        actor: &str,
        reason: &str,
        missing_items: &[usize],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let missing_value = missing_value(order, missing_items)?;
        if missing_value.is_positive() && order.customer_id.is_none() {
            return Err(EngineError::validation(
                "missing items can only be credited to a known customer",
            ));
        }

        let outcome = payment::rollback(order, missing_value, &self.config.locked_methods, now);
        let credit = outcome.loyalty_credit();
        if let Some(customer_id) = order.customer_id
            && credit.is_positive()
        {
            let entry = LoyaltyEntry::refund_credit(
                format!("cancel:{}", order.id),
                customer_id,
                order.id,
                credit,
                reason,
                now,
            );
            self.loyalty.append(entry).await?;
            info!(order_id = order.id, customer_id, %credit, "cancellation credited to cashback");
        }
        if outcome.upstream.is_positive() {
            warn!(
                order_id = order.id,
                amount = %outcome.upstream,
                "locked payments left for upstream refund"
            );
        }
        if outcome.reversed.is_positive() {
            info!(order_id = order.id, amount = %outcome.reversed, "payments reversed");
        }

        order.cancellation_reason = Some(reason.to_string());
        order.record_status(OrderStatus::Canceled, actor, now);
        Ok(())
    }
}

/// Sum of the line totals at `indices`, which must be distinct and in range.
pub(crate) fn missing_value(order: &Order, indices: &[usize]) -> Result<Money> {
    let mut seen = HashSet::new();
    let mut value = Money::ZERO;
    for &index in indices {
        let item = order.items.get(index).ok_or_else(|| {
            EngineError::validation(format!("order {} has no item {}", order.id, index))
        })?;
        if !seen.insert(index) {
            return Err(EngineError::validation(format!(
                "item {} listed twice",
                index
            )));
        }
        value += item.line_total;
    }
    Ok(value)
}
