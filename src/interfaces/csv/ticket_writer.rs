use crate::domain::closure::TicketZ;
use crate::domain::money::Money;
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct TicketRow<'a> {
    date: NaiveDate,
    sequence: u64,
    completed_orders: usize,
    canceled_orders: usize,
    gross_sales: Money,
    vat_collected: Money,
    net_sales: Money,
    method: &'a str,
    method_amount: Money,
    method_count: usize,
}

/// Writes Ticket Z records as CSV, one row per payment method.
///
/// A day without payments still gets a single row with an empty method.
pub struct TicketWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TicketWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_tickets(&mut self, tickets: &[TicketZ]) -> Result<()> {
        for ticket in tickets {
            let row = |method: &'static str, amount: Money, count: usize| TicketRow {
                date: ticket.date,
                sequence: ticket.sequence,
                completed_orders: ticket.completed_orders,
                canceled_orders: ticket.canceled_orders,
                gross_sales: ticket.gross_sales,
                vat_collected: ticket.vat_collected,
                net_sales: ticket.net_sales,
                method,
                method_amount: amount,
                method_count: count,
            };
            if ticket.payments_by_method.is_empty() {
                self.writer.serialize(row("", Money::ZERO.round(), 0))?;
            }
            for total in &ticket.payments_by_method {
                self.writer
                    .serialize(row(total.method.as_str(), total.amount, total.count))?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}
