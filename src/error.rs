use crate::domain::money::Money;
use crate::domain::order::OrderStatus;
use crate::domain::payment::PaymentMethod;
use chrono::NaiveDate;
use miette::Diagnostic;
use thiserror::Error;

/// Every failure the engine can surface to a caller.
///
/// Domain variants leave state untouched; `Storage`, `Io`, `Serialization`
/// and `Internal` come from adapters.
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("illegal transition from {from} to {to}")]
    #[diagnostic(code(caisse::illegal_transition))]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("business day {0} is closed")]
    #[diagnostic(code(caisse::day_closed))]
    DayClosed(NaiveDate),

    #[error("payment of {attempted} would exceed order total {total}")]
    #[diagnostic(code(caisse::overpayment_rejected))]
    OverpaymentRejected { attempted: Money, total: Money },

    #[error("payments recorded with method {0} cannot be modified")]
    #[diagnostic(code(caisse::payment_locked))]
    PaymentLocked(PaymentMethod),

    #[error("insufficient loyalty balance: requested {requested}, available {available}")]
    #[diagnostic(code(caisse::insufficient_balance))]
    InsufficientBalance { requested: Money, available: Money },

    #[error("business day {0} is already closed")]
    #[diagnostic(code(caisse::already_closed))]
    AlreadyClosed(NaiveDate),

    #[error("business day {date} still has {count} pending order(s)")]
    #[diagnostic(code(caisse::pending_orders))]
    PendingOrders { date: NaiveDate, count: usize },

    #[error("{0} not found")]
    #[diagnostic(code(caisse::not_found))]
    NotFound(String),

    #[error("validation error: {0}")]
    #[diagnostic(code(caisse::validation))]
    ValidationError(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(caisse::io))]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(caisse::csv))]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    #[diagnostic(code(caisse::serialization))]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    #[diagnostic(code(caisse::storage))]
    Storage(#[from] rocksdb::Error),

    #[error("internal error: {0}")]
    #[diagnostic(code(caisse::internal))]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// HTTP status a front end should see for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_) => 400,
            Self::NotFound(_) => 404,
            Self::IllegalTransition { .. }
            | Self::AlreadyClosed(_)
            | Self::PendingOrders { .. } => 409,
            Self::OverpaymentRejected { .. } | Self::InsufficientBalance { .. } => 422,
            Self::DayClosed(_) | Self::PaymentLocked(_) => 423,
            _ => 500,
        }
    }

    /// Stable machine-readable name, used by the command protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::DayClosed(_) => "day_closed",
            Self::OverpaymentRejected { .. } => "overpayment_rejected",
            Self::PaymentLocked(_) => "payment_locked",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AlreadyClosed(_) => "already_closed",
            Self::PendingOrders { .. } => "pending_orders",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            _ => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
