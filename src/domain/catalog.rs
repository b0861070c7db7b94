//! Read-only data owned by collaborators: catalog entries and store settings.

use super::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ProductId = u32;
pub type CategoryId = u32;
pub type OptionId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: OptionId,
    pub name: String,
    #[serde(default)]
    pub price_delta: Money,
}

/// A catalog product as seen at order-creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    pub price: Money,
    #[serde(default)]
    pub options: Vec<ProductOption>,
}

impl Product {
    pub fn option(&self, id: OptionId) -> Option<&ProductOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// Store-wide settings relevant to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Cashback earned on a paid order, in percent of its total.
    pub loyalty_percentage: Decimal,
    /// VAT rate included in sale prices, in percent.
    pub vat_rate: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            loyalty_percentage: Decimal::ZERO,
            vat_rate: Decimal::TEN,
        }
    }
}
