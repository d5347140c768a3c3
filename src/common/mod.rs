//! Common utilities shared across the harness, suite driver and report

pub mod error;
pub mod logging;

pub use error::{Error, Result};
