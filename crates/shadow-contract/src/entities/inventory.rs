//! Pantry and household inventory

use crate::repository::{EntityKind, Record};
use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Identifier
    pub id: EntityId,
    /// Item name
    pub name: String,
    /// Amount on hand
    pub quantity: f64,
    /// Unit of `quantity` (`"kg"`, `"pcs"`, ...)
    pub unit: String,
    /// Storage location
    pub location: String,
    /// Labels; order carries no meaning
    pub tags: Vec<String>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Record for InventoryItem {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// `list` filter for inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryFilter {
    /// Restrict to one location
    pub location: Option<String>,
    /// Items at or below this quantity
    pub max_quantity: Option<f64>,
}

impl InventoryFilter {
    /// Whether `item` passes the filter
    #[must_use]
    pub fn matches(&self, item: &InventoryItem) -> bool {
        self.location.as_ref().map_or(true, |l| &item.location == l)
            && self.max_quantity.map_or(true, |max| item.quantity <= max)
    }
}

/// `create` payload for inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryInput {
    /// Item name
    pub name: String,
    /// Amount on hand
    pub quantity: f64,
    /// Unit of `quantity`
    pub unit: String,
    /// Storage location
    pub location: String,
    /// Labels
    pub tags: Vec<String>,
}

/// `update` payload for inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryPatch {
    /// New amount on hand
    pub quantity: Option<f64>,
    /// New location
    pub location: Option<String>,
}

/// Inventory entity kind
#[derive(Debug, Clone, Copy)]
pub struct Inventory;

impl EntityKind for Inventory {
    const NAME: &'static str = "inventory";
    type Entity = InventoryItem;
    type Filter = InventoryFilter;
    type Input = InventoryInput;
    type Patch = InventoryPatch;
}
