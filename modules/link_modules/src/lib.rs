// === MODULE DEFINITION ===
// The link-modules capability is registered through inventory; linking this
// crate into a binary is enough for `LinkCapability::discover` to find it.
pub mod module;
pub use module::{builtin_definitions, LinkModules, LINK_MODULES_PACKAGE};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod domain;
