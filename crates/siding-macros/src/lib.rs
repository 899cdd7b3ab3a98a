//! Procedural macros for the siding add-on framework.
//!
//! This crate provides:
//!
//! - `#[register_addon(kind)]` - Registers an add-on factory at link time
//!
//! # Add-on registration
//!
//! Add-on implementations are not discovered by scanning loaded code. Instead
//! each implementation module contributes a factory function to the
//! `ADDON_FACTORIES` table in `siding-framework`:
//!
//! ```rust,ignore
//! use siding_framework::prelude::*;
//!
//! struct Clock;
//! impl Addon for Clock {}
//!
//! #[register_addon(plugin)]
//! fn clock(_descriptor: &AddonDescriptor) -> Result<Box<dyn Addon>, BoxError> {
//!     Ok(Box::new(Clock))
//! }
//! ```
//!
//! The factory is matched against the descriptor's `module` (which defaults
//! to the add-on name). Use `module = "..."` when the function name differs:
//!
//! ```rust,ignore
//! #[register_addon(style, module = "dark")]
//! fn make_dark_style(_d: &AddonDescriptor) -> Result<Box<dyn Addon>, BoxError> { ... }
//! ```

mod addon;

use proc_macro::TokenStream;

/// Registers the decorated function as the factory for one add-on module.
///
/// The first argument is the add-on kind (`plugin`, `style`, or any custom
/// kind). The optional `module = "..."` argument overrides the module name,
/// which otherwise is the function name.
///
/// The function must have the signature
/// `fn(&AddonDescriptor) -> Result<Box<dyn Addon>, BoxError>`.
#[proc_macro_attribute]
pub fn register_addon(attr: TokenStream, item: TokenStream) -> TokenStream {
    addon::register_addon(attr, item)
}
