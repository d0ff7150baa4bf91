// Links every module crate so its inventory registration is visible to
// `BootstrapCatalog::discover` and `LinkCapability::discover`.
#![allow(unused_imports)]

use cart as _;
use link_modules as _;
use product as _;
