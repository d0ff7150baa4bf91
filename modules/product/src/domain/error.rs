use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    #[error("Product with handle '{handle}' already exists")]
    HandleAlreadyExists { handle: String },

    #[error("Variant with SKU '{sku}' already exists")]
    SkuAlreadyExists { sku: String },

    #[error("Product title cannot be empty")]
    EmptyTitle,

    #[error("Unknown product entity '{entity}'")]
    UnknownEntity { entity: String },
}

impl DomainError {
    pub fn product_not_found(id: impl Into<String>) -> Self {
        Self::ProductNotFound { id: id.into() }
    }
}
