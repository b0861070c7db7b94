//! Static adapters for the read-only collaborator ports.

use crate::domain::catalog::{Product, ProductId, Settings};
use crate::domain::ports::{Catalog, Clock, PromotionSource, SettingsSource};
use crate::domain::promotion::PromotionDefinition;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Catalog, promotions and settings as exported by the back office.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorData {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub promotions: Vec<PromotionDefinition>,
}

impl CollaboratorData {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: Arc<HashMap<ProductId, Product>>,
}

impl StaticCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.get(&product_id).cloned())
    }
}

/// Publishes a fixed set of definitions. Filtering by validity is left to the
/// evaluator, which sees the local time.
#[derive(Debug, Clone, Default)]
pub struct StaticPromotions {
    promotions: Arc<Vec<PromotionDefinition>>,
}

impl StaticPromotions {
    pub fn new(promotions: Vec<PromotionDefinition>) -> Self {
        Self {
            promotions: Arc::new(promotions),
        }
    }
}

#[async_trait]
impl PromotionSource for StaticPromotions {
    async fn active_promotions(&self, _now: DateTime<Utc>) -> Result<Vec<PromotionDefinition>> {
        Ok(self.promotions.iter().filter(|p| p.active).cloned().collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSettings {
    settings: Settings,
}

impl StaticSettings {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn settings(&self) -> Result<Settings> {
        Ok(self.settings)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(at)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
