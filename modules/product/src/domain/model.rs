use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
    pub id: String,
    pub title: String,
    /// Derived from the title when empty.
    #[serde(default)]
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductVariant {
    pub id: String,
    #[serde(default)]
    pub product_id: String,
    pub sku: String,
    pub title: String,
    /// Minor currency units.
    pub price: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub title: String,
    pub handle: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVariant {
    pub sku: String,
    pub title: String,
    pub price: i64,
}

/// `"Summer Shirt!"` → `"summer-shirt"`.
pub fn handleize(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::handleize;

    #[test]
    fn handleize_slugs_titles() {
        assert_eq!(handleize("Summer Shirt!"), "summer-shirt");
        assert_eq!(handleize("  Mug -- XL "), "mug-xl");
    }
}
