//! Shared error hierarchy and string helpers for Warden.

pub mod error;
pub mod util;

pub use error::{ConfigError, WardenError};
pub use util::{truncate_chars, truncate_str};
