pub mod error;
pub mod logging;
pub mod normalization;
pub mod string_utils;

pub use error::*;
pub use string_utils::{short_id, truncate_chars, truncate_with_suffix};
