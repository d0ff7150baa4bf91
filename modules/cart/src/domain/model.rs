use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cart {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Empty in seed data means the configured default.
    #[serde(default)]
    pub currency_code: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn total(&self) -> i64 {
        self.items.iter().map(LineItem::subtotal).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineItem {
    pub id: String,
    /// Filled from the owning cart when loading seed data.
    #[serde(default)]
    pub cart_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub title: String,
    pub quantity: u32,
    /// Minor currency units.
    pub unit_price: i64,
}

impl LineItem {
    pub fn subtotal(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: Option<String>,
    pub title: String,
    pub quantity: u32,
    pub unit_price: i64,
}
