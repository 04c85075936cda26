//! Shared result alias.
//!
//! Each crate defines its own error enum in its `error` module and returns
//! it wrapped in a [`rootcause::Report`]. Trait seams spell that as
//! `roster_core::Result<T, TheirError>`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
