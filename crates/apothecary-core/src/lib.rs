//! Apothecary core crate - shared records, configuration, errors, and loaders.

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;
pub mod types;

pub use config::ApothecaryConfig;
pub use error::{ApothecaryError, Result};
pub use query::{validate_query, validate_top_k, DEFAULT_TOP_K};
pub use types::*;
