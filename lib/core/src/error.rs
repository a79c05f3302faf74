//! Error handling foundation for lark-login.
//!
//! Only the `Result` alias lives here. Each crate defines its own domain
//! error enum and returns `Report<ThatError>` from fallible functions.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
