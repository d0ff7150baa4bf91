use serde::{Deserialize, Serialize};

use crate::domain::Cart;

/// Options of the cart module, read from its declaration's `options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CartConfig {
    #[serde(default = "default_currency_code")]
    pub default_currency_code: String,
    #[serde(default = "default_max_line_items")]
    pub max_line_items: usize,
    /// Carts present at startup.
    #[serde(default)]
    pub seed: Vec<Cart>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            default_currency_code: default_currency_code(),
            max_line_items: default_max_line_items(),
            seed: Vec::new(),
        }
    }
}

fn default_currency_code() -> String {
    "usd".to_owned()
}

fn default_max_line_items() -> usize {
    100
}
