use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Cart not found: {id}")]
    CartNotFound { id: String },

    #[error("Line item '{id}' not found in cart '{cart_id}'")]
    LineItemNotFound { cart_id: String, id: String },

    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("Cart '{cart_id}' already holds the maximum of {max} line items")]
    TooManyItems { cart_id: String, max: usize },

    #[error("Unknown cart entity '{entity}'")]
    UnknownEntity { entity: String },
}

impl DomainError {
    pub fn cart_not_found(id: impl Into<String>) -> Self {
        Self::CartNotFound { id: id.into() }
    }

    pub fn line_item_not_found(cart_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self::LineItemNotFound {
            cart_id: cart_id.into(),
            id: id.into(),
        }
    }
}
