// === MODULE DEFINITION ===
// The bootstrap for `@commerce/product` is registered through inventory.
pub mod module;
pub use module::{ProductModule, PRODUCT_PACKAGE};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
