use crate::domain::payment::PaymentMethod;
use crate::error::{EngineError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Runtime knobs of the order engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Offset of the restaurant's local time, used to derive business dates
    /// and to evaluate time-window promotions.
    pub utc_offset: FixedOffset,
    /// Methods settled by an upstream processor. Their entries are never
    /// modified or reversed locally.
    pub locked_methods: Vec<PaymentMethod>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            locked_methods: vec![PaymentMethod::Online],
        }
    }
}

impl EngineConfig {
    pub fn with_offset_minutes(mut self, minutes: i32) -> Result<Self> {
        self.utc_offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            EngineError::validation(format!("invalid UTC offset: {} minutes", minutes))
        })?;
        Ok(self)
    }

    pub fn with_locked_methods(mut self, methods: Vec<PaymentMethod>) -> Self {
        self.locked_methods = methods;
        self
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.utc_offset)
    }

    /// Local calendar date an instant belongs to.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    pub fn is_locked(&self, method: PaymentMethod) -> bool {
        self.locked_methods.contains(&method)
    }
}
