use crate::application::{NewItem, NewOrder, OrderEngine};
use crate::domain::closure::TicketZ;
use crate::domain::money::Amount;
use crate::domain::order::{CustomerId, OrderId, OrderStatus};
use crate::domain::payment::PaymentRequest;
use crate::error::{EngineError, Result};
use crate::infrastructure::sources::ManualClock;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read};

fn default_actor() -> String {
    "system".to_string()
}

/// One request of the batch protocol, tagged by `command`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    CreateOrder(NewOrder),
    UpdateItems {
        order_id: OrderId,
        items: Vec<NewItem>,
    },
    Transition {
        order_id: OrderId,
        target: OrderStatus,
        #[serde(default = "default_actor")]
        actor: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        missing_items: Vec<usize>,
    },
    RecordPayment {
        order_id: OrderId,
        entries: Vec<PaymentRequest>,
        #[serde(default)]
        idempotency_key: Option<String>,
    },
    ModifyPayment {
        order_id: OrderId,
        entries: Vec<PaymentRequest>,
    },
    RefundItems {
        order_id: OrderId,
        item_indices: Vec<usize>,
        reason: String,
    },
    RedeemCashback {
        order_id: OrderId,
        amount: Amount,
        #[serde(default)]
        idempotency_key: Option<String>,
    },
    CloseDay {
        date: NaiveDate,
        #[serde(default = "default_actor")]
        actor: String,
    },
    DailyStatus {
        date: NaiveDate,
    },
    Ticket {
        date: NaiveDate,
    },
    GetOrder {
        order_id: OrderId,
    },
    LoyaltyBalance {
        customer_id: CustomerId,
    },
}

/// A command with the instant it happens at, if the caller drives the clock.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub command: Command,
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            status: None,
            code: None,
            error: None,
        }
    }

    pub fn failure(error: &EngineError) -> Self {
        Self {
            ok: false,
            result: None,
            status: Some(error.status_code()),
            code: Some(error.kind()),
            error: Some(error.to_string()),
        }
    }
}

/// Reads newline-delimited JSON commands.
///
/// Blank lines are skipped; a malformed line yields an error naming its line
/// number and reading continues.
pub struct CommandReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<Envelope>> {
        self.reader
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(text) if text.trim().is_empty()))
            .map(|(index, line)| {
                let line = line?;
                serde_json::from_str(&line).map_err(|e| {
                    EngineError::validation(format!("line {}: {}", index + 1, e))
                })
            })
    }
}

/// Runs commands against an engine whose clock it controls.
pub struct CommandProcessor {
    engine: OrderEngine,
    clock: ManualClock,
    tickets: Vec<TicketZ>,
}

impl CommandProcessor {
    /// `clock` must be the clock the engine was built with.
    pub fn new(engine: OrderEngine, clock: ManualClock) -> Self {
        Self {
            engine,
            clock,
            tickets: Vec::new(),
        }
    }

    pub fn engine(&self) -> &OrderEngine {
        &self.engine
    }

    /// Ticket Z records issued so far by `close_day` commands.
    pub fn tickets(&self) -> &[TicketZ] {
        &self.tickets
    }

    pub async fn execute(&mut self, envelope: Envelope) -> Response {
        if let Some(at) = envelope.at {
            self.clock.set(at);
        }
        match self.dispatch(envelope.command).await {
            Ok(result) => Response::success(result),
            Err(e) => Response::failure(&e),
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Value> {
        let engine = &self.engine;
        let value = match command {
            Command::CreateOrder(order) => serde_json::to_value(engine.create_order(order).await?)?,
            Command::UpdateItems { order_id, items } => {
                serde_json::to_value(engine.update_items(order_id, items).await?)?
            }
            Command::Transition {
                order_id,
                target,
                actor,
                reason,
                missing_items,
            } => serde_json::to_value(
                engine
                    .transition(order_id, target, &actor, reason.as_deref(), &missing_items)
                    .await?,
            )?,
            Command::RecordPayment {
                order_id,
                entries,
                idempotency_key,
            } => serde_json::to_value(
                engine
                    .record_payment(order_id, entries, idempotency_key.as_deref())
                    .await?,
            )?,
            Command::ModifyPayment { order_id, entries } => {
                serde_json::to_value(engine.modify_payment(order_id, entries).await?)?
            }
            Command::RefundItems {
                order_id,
                item_indices,
                reason,
            } => serde_json::to_value(engine.refund_items(order_id, item_indices, &reason).await?)?,
            Command::RedeemCashback {
                order_id,
                amount,
                idempotency_key,
            } => serde_json::to_value(
                engine
                    .redeem_cashback(order_id, amount, idempotency_key.as_deref())
                    .await?,
            )?,
            Command::CloseDay { date, actor } => {
                let ticket = engine.close_day(date, &actor).await?;
                let value = serde_json::to_value(&ticket)?;
                self.tickets.push(ticket);
                value
            }
            Command::DailyStatus { date } => serde_json::to_value(engine.daily_status(date).await?)?,
            Command::Ticket { date } => serde_json::to_value(engine.ticket(date).await?)?,
            Command::GetOrder { order_id } => serde_json::to_value(engine.get_order(order_id).await?)?,
            Command::LoyaltyBalance { customer_id } => {
                serde_json::to_value(engine.loyalty_balance(customer_id).await?)?
            }
        };
        Ok(value)
    }
}
