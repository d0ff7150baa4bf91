// === MODULE DEFINITION ===
// The bootstrap for `@commerce/cart` is registered through inventory.
pub mod module;
pub use module::{CartModule, CART_PACKAGE};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
