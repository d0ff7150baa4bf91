use serde::{Deserialize, Serialize};

use crate::domain::Product;

/// Options of the product module, read from its declaration's `options`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductConfig {
    /// Publish new products right away instead of creating drafts.
    #[serde(default)]
    pub publish_on_create: bool,
    /// Products present at startup.
    #[serde(default)]
    pub seed: Vec<Product>,
}
