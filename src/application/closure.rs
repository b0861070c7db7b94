use super::engine::OrderEngine;
use crate::domain::closure::{self, DailyStatus, TicketZ};
use crate::error::{EngineError, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

impl OrderEngine {
    /// Closes a business day and issues its Ticket Z.
    ///
    /// Holds the day's gate exclusively, so no order of that date can change
    /// between the pending check and the write.
    pub async fn close_day(&self, date: NaiveDate, actor: &str) -> Result<TicketZ> {
        let result: Result<TicketZ> = async {
            let settings = self.settings.settings().await?;
            let now = self.clock.now();
            let today = self.config.business_date(now);
            if date > today {
                return Err(EngineError::validation(format!(
                    "cannot close {} before it starts (today is {})",
                    date, today
                )));
            }

            let _day = self.days.exclusive(date).await;
            if self.closures.is_closed(date).await? {
                return Err(EngineError::AlreadyClosed(date));
            }
            let orders = self.orders.orders_on(date).await?;
            let pending = orders.iter().filter(|o| !o.status.is_terminal()).count();
            if pending > 0 {
                return Err(EngineError::PendingOrders {
                    date,
                    count: pending,
                });
            }

            let _sequence = self.closing.lock().await;
            let sequence = self.closures.last_sequence().await? + 1;
            let ticket = closure::aggregate(date, sequence, &orders, settings.vat_rate, actor, now);
            self.closures.insert(ticket.clone()).await?;
            info!(
                %date,
                sequence,
                gross = %ticket.gross_sales,
                completed = ticket.completed_orders,
                canceled = ticket.canceled_orders,
                actor,
                "day closed"
            );
            Ok(ticket)
        }
        .await;
        result.inspect_err(|e| warn!(%date, error = %e, "day closure rejected"))
    }

    /// Closure state of `date`, and whether an earlier day was left open.
    pub async fn daily_status(&self, date: NaiveDate) -> Result<DailyStatus> {
        let is_closed = self.closures.is_closed(date).await?;
        let pending_orders = self
            .orders
            .orders_on(date)
            .await?
            .iter()
            .filter(|o| !o.status.is_terminal())
            .count();

        let closed = self.closures.closed_dates().await?;
        let oldest_unclosed_date = self
            .orders
            .business_dates()
            .await?
            .into_iter()
            .filter(|d| *d < date && !closed.contains(d))
            .min();

        Ok(DailyStatus {
            date,
            is_closed,
            pending_orders,
            needs_closure: oldest_unclosed_date.is_some(),
            oldest_unclosed_date,
        })
    }

    pub async fn ticket(&self, date: NaiveDate) -> Result<TicketZ> {
        self.closures
            .get(date)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("ticket Z for {}", date)))
    }
}
